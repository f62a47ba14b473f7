use crate::domain::model::{ProbeError, ProbePolicy};
use crate::utils::error::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default wait unit between retries; attempt `n` waits `(n + 1)` units.
const BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Minimum spacing between consecutive requests sharing one client.
///
/// The timestamp is taken when a request finishes, so the spacing follows
/// the real request cadence rather than the order requests were issued in.
/// Requests issued while another one is still in flight are not spaced.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until `interval` has passed since the last completed request.
    ///
    /// The lock is held while sleeping, so callers leave this one at a time.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                tracing::debug!("Throttling: sleeping {:.2}s", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }
    }

    pub async fn mark_completed(&self) {
        *self.last_request.lock().await = Some(Instant::now());
    }
}

/// Runs `op` until it succeeds or `max_retries` retries are used up.
///
/// Every attempt goes through the throttle first. Between attempts the task
/// sleeps `(attempt + 1) * backoff_unit`. The last error is returned once all
/// `max_retries + 1` attempts have failed.
pub async fn retry_with_backoff<T, F, Fut>(
    limiter: &RateLimiter,
    max_retries: u32,
    backoff_unit: Duration,
    mut op: F,
) -> std::result::Result<T, ProbeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ProbeError>>,
{
    let mut last_error = ProbeError::Network("no request attempted".to_string());

    for attempt in 0..=max_retries {
        limiter.wait().await;
        let outcome = op().await;
        limiter.mark_completed().await;

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}",
                    attempt + 1,
                    max_retries + 1,
                    e
                );
                last_error = e;
                if attempt < max_retries {
                    tokio::time::sleep(backoff_unit * (attempt + 1)).await;
                }
            }
        }
    }

    Err(last_error)
}

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
}

/// A fully buffered response, detached from the connection.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    url: String,
    headers: HeaderMap,
    body: String,
}

impl HttpResponse {
    /// Builds a response from plain parts. Header pairs that are not valid
    /// HTTP headers are dropped.
    pub fn from_parts(
        status: u16,
        url: impl Into<String>,
        headers: &[(&str, &str)],
        body: impl Into<String>,
    ) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
                let value = HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
            .collect();

        Self {
            status,
            url: url.into(),
            headers,
            body: body.into(),
        }
    }

    async fn read(response: reqwest::Response) -> std::result::Result<Self, ProbeError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(classify)?;

        Ok(Self {
            status,
            url,
            headers,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, ProbeError> {
        serde_json::from_str(&self.body).map_err(|e| ProbeError::Parse(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Network(err.to_string())
    }
}

/// The one HTTP client every probe of a scan goes through.
///
/// It owns the throttle, so all probes sharing an instance share the pacing.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
    policy: Arc<ProbePolicy>,
    limiter: RateLimiter,
    backoff_unit: Duration,
}

impl HttpClient {
    pub fn new(policy: Arc<ProbePolicy>) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.clone())
            .build()?;
        let no_redirect = Client::builder()
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.clone())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            no_redirect,
            limiter: RateLimiter::new(policy.rate_limit),
            policy,
            backoff_unit: BACKOFF_UNIT,
        })
    }

    /// Overrides the retry wait unit (one second by default).
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, ProbeError> {
        self.send(&self.client, Method::GET, url, headers, &RequestBody::Empty)
            .await
    }

    /// GET that reports 3xx responses instead of following them.
    pub async fn get_no_redirect(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, ProbeError> {
        self.send(&self.no_redirect, Method::GET, url, headers, &RequestBody::Empty)
            .await
    }

    pub async fn post(
        &self,
        url: &str,
        body: RequestBody,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, ProbeError> {
        self.send(&self.client, Method::POST, url, headers, &body)
            .await
    }

    async fn send(
        &self,
        client: &Client,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &RequestBody,
    ) -> std::result::Result<HttpResponse, ProbeError> {
        let response = retry_with_backoff(
            &self.limiter,
            self.policy.max_retries,
            self.backoff_unit,
            || {
                let request = build_request(client, method.clone(), url, headers, body);
                async move {
                    let response = request.send().await.map_err(classify)?;
                    HttpResponse::read(response).await
                }
            },
        )
        .await?;

        tracing::debug!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }
}

fn build_request(
    client: &Client,
    method: Method,
    url: &str,
    headers: &[(&str, &str)],
    body: &RequestBody,
) -> RequestBuilder {
    let mut request = client.request(method, url);

    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    match body {
        RequestBody::Empty => request,
        RequestBody::Json(value) => request.json(value),
        RequestBody::Form(fields) => request.form(fields),
        RequestBody::Text(text) => request.body(text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_policy(max_retries: u32) -> Arc<ProbePolicy> {
        Arc::new(ProbePolicy {
            timeout: Duration::from_secs(2),
            rate_limit: Duration::ZERO,
            user_agent: "digtool-test/1.0".to_string(),
            max_retries,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_sequential_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        for _ in 0..5 {
            limiter.wait().await;
            limiter.mark_completed().await;
        }

        assert!(start.elapsed() >= Duration::from_millis(500) * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_first_request_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(3));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_makes_at_most_k_plus_one_attempts() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let attempts = AtomicU32::new(0);

        let result: std::result::Result<(), ProbeError> =
            retry_with_backoff(&limiter, 3, Duration::from_secs(1), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ProbeError::Network("connection refused".to_string())) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(
            result.unwrap_err(),
            ProbeError::Network("connection refused".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_is_linear() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();

        let _: std::result::Result<(), ProbeError> =
            retry_with_backoff(&limiter, 2, Duration::from_secs(1), || async {
                Err(ProbeError::Timeout)
            })
            .await;

        // 1s after the first failure, 2s after the second, nothing after the last.
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_first_success() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff(&limiter, 5, Duration::from_millis(10), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(ProbeError::Timeout)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_error_status_is_returned_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/down");
            then.status(503).body("maintenance");
        });

        let client = HttpClient::new(test_policy(3)).unwrap();
        let response = client.get(&server.url("/down"), &[]).await.unwrap();

        assert_eq!(response.status(), 503);
        assert_eq!(response.text(), "maintenance");
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_user_agent_and_extra_headers_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/submit")
                .header("user-agent", "digtool-test/1.0")
                .header("x-custom", "1")
                .json_body(serde_json::json!({"email": "a@b.c"}));
            then.status(200).header("content-type", "application/json").body("{}");
        });

        let client = HttpClient::new(test_policy(0)).unwrap();
        let response = client
            .post(
                &server.url("/submit"),
                RequestBody::Json(serde_json::json!({"email": "a@b.c"})),
                &[("X-Custom", "1")],
            )
            .await
            .unwrap();

        mock.assert();
        assert_eq!(response.content_type(), "application/json");
    }

    #[tokio::test]
    async fn test_no_redirect_exposes_location() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/someone");
            then.status(302).header("Location", "/login");
        });

        let client = HttpClient::new(test_policy(0)).unwrap();
        let response = client
            .get_no_redirect(&server.url("/users/someone"), &[])
            .await
            .unwrap();

        assert_eq!(response.status(), 302);
        assert_eq!(response.location(), Some("/login"));
    }

    #[tokio::test]
    async fn test_slow_server_yields_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(3));
        });

        let policy = Arc::new(ProbePolicy {
            timeout: Duration::from_millis(300),
            ..(*test_policy(0)).clone()
        });
        let client = HttpClient::new(policy).unwrap();
        let err = client.get(&server.url("/slow"), &[]).await.unwrap_err();

        assert_eq!(err, ProbeError::Timeout);
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[tokio::test]
    async fn test_refused_connection_surfaces_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(test_policy(1))
            .unwrap()
            .with_backoff_unit(Duration::from_millis(10));
        let err = client
            .get(&format!("http://{}/", addr), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Network(_)));
    }

    #[test]
    fn test_response_from_parts() {
        let response = HttpResponse::from_parts(
            200,
            "https://example.com/",
            &[("Content-Type", "image/png"), ("bad header", "x")],
            "",
        );
        assert_eq!(response.content_type(), "image/png");
        assert_eq!(response.header("bad header"), None);
        assert!(response.json::<serde_json::Value>().is_err());
    }
}
