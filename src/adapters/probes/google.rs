use super::join_url;
use crate::adapters::http::{HttpClient, HttpResponse, RequestBody};
use crate::domain::model::{evidence, ProbeError, ProbeResult};
use crate::domain::ports::Probe;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const NAME: &str = "google";

const BASE_URL: &str = "https://accounts.google.com";
const LOOKUP_PATH: &str = "/v3/signin/_/AccountsSignInUi/data/batchexecute";

pub struct GoogleProbe {
    client: Arc<HttpClient>,
    base_url: String,
}

/// 200 means the sign-in flow accepted the identifier; any other client
/// error means it was rejected. Server errors say nothing.
pub fn interpret(response: &HttpResponse) -> ProbeResult {
    match response.status() {
        200 => ProbeResult::hit(evidence("identifier_accepted", json!({ "status_code": 200 }))),
        status @ 400..=499 => ProbeResult::miss(Some(evidence(
            format!("identifier_rejected_{}", status),
            json!({ "status_code": status }),
        ))),
        status => ProbeError::UnexpectedStatus(status).into(),
    }
}

impl GoogleProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

#[async_trait]
impl Probe for GoogleProbe {
    fn name(&self) -> &str {
        NAME
    }

    async fn check(&self, email: &str) -> ProbeResult {
        tracing::debug!("[Google] Checking {}", email);

        let request = json!([[["MI613e", json!([null, email]).to_string(), null, "generic"]]]);
        let response = self
            .client
            .post(
                &join_url(&self.base_url, LOOKUP_PATH),
                RequestBody::Form(vec![("f.req".to_string(), request.to_string())]),
                &[
                    ("Origin", BASE_URL),
                    ("Referer", "https://accounts.google.com/signin/v2/identifier"),
                ],
            )
            .await;

        match response {
            Ok(response) => {
                let result = interpret(&response);
                tracing::info!(
                    "[Google] Email {} -> {:?} (status {})",
                    email,
                    result.found(),
                    response.status()
                );
                result
            }
            Err(e) => {
                tracing::error!("[Google] Request error for {}: {}", email, e);
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_decision_table() {
        let ok = HttpResponse::from_parts(200, "u", &[], ")]}'\n[]");
        assert_eq!(interpret(&ok).found(), Some(true));

        let rejected = interpret(&HttpResponse::from_parts(400, "u", &[], ""));
        assert_eq!(rejected.found(), Some(false));
        assert!(rejected.error().is_none());
        assert_eq!(rejected.evidence(), Some("identifier_rejected_400"));

        let broken = interpret(&HttpResponse::from_parts(502, "u", &[], ""));
        assert_eq!(broken.found(), None);
        assert_eq!(broken.error(), Some("Unexpected status: 502"));
    }
}
