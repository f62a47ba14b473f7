use super::join_url;
use crate::adapters::http::{HttpClient, HttpResponse, RequestBody};
use crate::domain::model::{evidence, ProbeError, ProbeResult};
use crate::domain::ports::Probe;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const NAME: &str = "adobe";

const BASE_URL: &str = "https://auth.services.adobe.com";
const ACCOUNTS_PATH: &str = "/signin/v2/users/accounts";
const NO_ACCOUNT_MARKER: &str = "no account associated with this email address";

pub struct AdobeProbe {
    client: Arc<HttpClient>,
    base_url: String,
}

/// Verdict for a response of the accounts endpoint.
pub fn interpret(response: &HttpResponse, url: &str) -> ProbeResult {
    match response.status() {
        404 => ProbeResult::miss(Some(evidence("account_not_found", json!({ "url": url })))),
        200 if response.text().to_lowercase().contains(NO_ACCOUNT_MARKER) => ProbeResult::miss(
            Some(evidence("no_account_message", json!({ "url": url }))),
        ),
        200 => ProbeResult::hit(evidence("account_lookup_200", json!({ "url": url }))),
        status => ProbeError::UnexpectedStatus(status).into(),
    }
}

impl AdobeProbe {
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
impl Probe for AdobeProbe {
    fn name(&self) -> &str {
        NAME
    }

    async fn check(&self, email: &str) -> ProbeResult {
        tracing::debug!("[Adobe] Checking {}", email);

        let url = join_url(&self.base_url, ACCOUNTS_PATH);
        let response = self
            .client
            .post(
                &url,
                RequestBody::Json(json!({ "username": email })),
                &[
                    ("Accept", "application/json"),
                    ("Accept-Language", "en-US,en;q=0.9"),
                    ("X-IMS-ClientId", "adobedotcom2"),
                ],
            )
            .await;

        match response {
            Ok(response) => {
                let result = interpret(&response, &url);
                match result.found() {
                    Some(true) => tracing::info!("[Adobe] Email {} already registered", email),
                    Some(false) => tracing::info!("[Adobe] Email {} not registered", email),
                    None => tracing::warn!(
                        "[Adobe] Unexpected status {} for {}",
                        response.status(),
                        email
                    ),
                }
                result
            }
            Err(e) => {
                tracing::error!("[Adobe] Request error for {}: {}", email, e);
                e.into()
            }
        }
    }
}
