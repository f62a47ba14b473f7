//! Data-driven probe for sites that leak account existence through their
//! password reset flow or a public profile page.
//!
//! The built-in `site_template` entry targets `example.com` and serves as the
//! starting point for real sites: copy it into a `[[templates]]` config table
//! with the site's URLs and wording.

use super::{join_url, page_text, snippet};
use crate::adapters::http::{HttpClient, HttpResponse, RequestBody};
use crate::domain::model::{evidence, ProbeError, ProbeResult};
use crate::domain::ports::Probe;
use crate::utils::error::{DigError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};
use url::Url;

pub const NAME: &str = "site_template";

const DEFAULT_BASE_URL: &str = "https://example.com";
const DEFAULT_RESET_PAGE: &str = "/account/password/reset";
const DEFAULT_RESET_ENDPOINT: &str = "/api/password_reset";
const DEFAULT_PROFILE_PATH: &str = "/users/{email}";

const DEFAULT_SENT_PATTERN: &str = r"(?i)(we have sent|check your inbox|email sent)";
const DEFAULT_AMBIGUOUS_PATTERN: &str =
    r"(?i)(if an account exists|we will not reveal|email not found)";

static SENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SENT_PATTERN).expect("default sent pattern is valid"));
static AMBIGUOUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_AMBIGUOUS_PATTERN).expect("default ambiguous pattern is valid")
});

/// Where a templated site lives and how its reset flow talks.
#[derive(Debug, Clone)]
pub struct SiteTemplate {
    name: String,
    base_url: String,
    reset_page: String,
    reset_endpoint: String,
    profile_path: String,
    sent_pattern: Regex,
    ambiguous_pattern: Regex,
}

impl SiteTemplate {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            reset_page: DEFAULT_RESET_PAGE.to_string(),
            reset_endpoint: DEFAULT_RESET_ENDPOINT.to_string(),
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
            sent_pattern: SENT_RE.clone(),
            ambiguous_pattern: AMBIGUOUS_RE.clone(),
        }
    }

    /// The placeholder site registered as `site_template`.
    pub fn example() -> Self {
        Self::new(NAME, DEFAULT_BASE_URL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_reset_page(mut self, path: impl Into<String>) -> Self {
        self.reset_page = path.into();
        self
    }

    pub fn with_reset_endpoint(mut self, path: impl Into<String>) -> Self {
        self.reset_endpoint = path.into();
        self
    }

    /// `{email}` in the path is replaced by the address being checked.
    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.profile_path = path.into();
        self
    }

    pub fn with_sent_pattern(mut self, pattern: &str) -> Result<Self> {
        self.sent_pattern = compile(&self.name, "sent_pattern", pattern)?;
        Ok(self)
    }

    pub fn with_ambiguous_pattern(mut self, pattern: &str) -> Result<Self> {
        self.ambiguous_pattern = compile(&self.name, "ambiguous_pattern", pattern)?;
        Ok(self)
    }

    /// Verdict from the reset endpoint's reply, if its wording gives one away.
    pub fn interpret_reset(&self, response: &HttpResponse) -> Option<ProbeResult> {
        let text = page_text(response.text());
        let raw = json!({
            "status_code": response.status(),
            "snippet": snippet(&text),
        });

        if self.sent_pattern.is_match(&text) {
            return Some(ProbeResult::hit(evidence(
                "password_reset_email_sent_message",
                raw,
            )));
        }
        if self.ambiguous_pattern.is_match(&text) {
            return Some(ProbeResult::ambiguous(evidence(
                "ambiguous_password_reset_message",
                raw,
            )));
        }
        None
    }

    /// Verdict from the profile page, fetched without following redirects.
    pub fn interpret_profile(
        &self,
        response: &HttpResponse,
        profile_url: &str,
    ) -> Option<ProbeResult> {
        match response.status() {
            200 => Some(ProbeResult::hit(evidence(
                "profile_page_200",
                json!({ "profile_url": profile_url }),
            ))),
            404 => Some(ProbeResult::miss(Some(evidence(
                "profile_404",
                json!({ "status_code": 404 }),
            )))),
            status @ (301 | 302) => Some(ProbeResult::ambiguous(evidence(
                format!("redirect_{}", status),
                json!({ "location": response.location() }),
            ))),
            _ => None,
        }
    }

    /// Each path segment is percent-encoded, so the address always stays in
    /// its own segment.
    fn profile_url(&self, email: &str) -> std::result::Result<String, ProbeError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProbeError::Internal(format!("bad base URL {}: {}", self.base_url, e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProbeError::Internal(format!("base URL {} cannot take a path", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in self.profile_path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&segment.replace("{email}", email));
            }
        }
        Ok(url.into())
    }
}

fn compile(site: &str, field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| DigError::InvalidConfigValueError {
        field: format!("templates.{}.{}", site, field),
        value: pattern.to_string(),
        reason: format!("Invalid regular expression: {}", e),
    })
}

pub struct SiteTemplateProbe {
    client: Arc<HttpClient>,
    site: SiteTemplate,
}

impl SiteTemplateProbe {
    pub fn new(client: Arc<HttpClient>, site: SiteTemplate) -> Self {
        Self { client, site }
    }
}

#[async_trait]
impl Probe for SiteTemplateProbe {
    fn name(&self) -> &str {
        self.site.name()
    }

    async fn check(&self, email: &str) -> ProbeResult {
        let site = &self.site;
        tracing::debug!("[{}] Checking {}", site.name, email);

        // Some sites only accept the reset POST once the form page set its cookies.
        if let Err(e) = self
            .client
            .get(&join_url(&site.base_url, &site.reset_page), &[])
            .await
        {
            tracing::debug!("[{}] Reset page unavailable: {}", site.name, e);
        }

        match self
            .client
            .post(
                &join_url(&site.base_url, &site.reset_endpoint),
                RequestBody::Json(json!({ "email": email })),
                &[],
            )
            .await
        {
            Ok(response) => {
                if let Some(result) = site.interpret_reset(&response) {
                    tracing::info!("[{}] Reset flow answered for {}", site.name, email);
                    return result;
                }
            }
            Err(e) => tracing::warn!("[{}] Reset request failed: {}", site.name, e),
        }

        let profile_url = match site.profile_url(email) {
            Ok(url) => url,
            Err(e) => return e.into(),
        };
        match self.client.get_no_redirect(&profile_url, &[]).await {
            Ok(response) => {
                if let Some(result) = site.interpret_profile(&response, &profile_url) {
                    return result;
                }
                tracing::debug!(
                    "[{}] Profile page gave status {}, no conclusion",
                    site.name,
                    response.status()
                );
                ProbeResult::ambiguous(evidence("no_conclusion", Value::Null))
            }
            Err(e) => {
                tracing::error!("[{}] Profile request failed for {}: {}", site.name, email, e);
                e.into()
            }
        }
    }
}
