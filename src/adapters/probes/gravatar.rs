use super::{join_url, normalize_email};
use crate::adapters::http::{HttpClient, HttpResponse};
use crate::domain::model::{evidence, ProbeData, ProbeError, ProbeResult};
use crate::domain::ports::Probe;
use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const NAME: &str = "gravatar";

const AVATAR_BASE: &str = "https://www.gravatar.com";
const PROFILE_BASE: &str = "https://gravatar.com";

/// Gravatar keys avatars by a hash of the trimmed, lowercased address.
pub struct GravatarProbe {
    client: Arc<HttpClient>,
    avatar_base: String,
    profile_base: String,
}

/// What the avatar lookup says about the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarStatus {
    Present { content_type: String },
    Absent,
    Unexpected { status: u16, content_type: String },
}

/// Maps the avatar response to a verdict. `d=404` makes Gravatar answer 404
/// instead of serving a default image.
pub fn classify_avatar(response: &HttpResponse) -> AvatarStatus {
    let content_type = response.content_type().to_string();
    match response.status() {
        200 if content_type.starts_with("image/") => AvatarStatus::Present { content_type },
        404 => AvatarStatus::Absent,
        status => AvatarStatus::Unexpected {
            status,
            content_type,
        },
    }
}

/// Hex MD5 of the normalized address, the key Gravatar's URLs use.
pub fn email_hash(email: &str) -> String {
    hex::encode(Md5::digest(normalize_email(email).as_bytes()))
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    entry: Vec<ProfileEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEntry {
    display_name: Option<String>,
    preferred_username: Option<String>,
    current_location: Option<String>,
    profile_background: Option<ProfileBackground>,
    #[serde(default)]
    accounts: Vec<LinkedAccount>,
}

#[derive(Debug, Deserialize)]
struct ProfileBackground {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkedAccount {
    url: Option<String>,
}

/// Extracts the public profile fields from a `/<hash>.json` document.
fn parse_profile(response: &HttpResponse) -> Result<ProbeData, ProbeError> {
    let document: ProfileDocument = response.json()?;
    let entry = document.entry.into_iter().next().unwrap_or_default();

    let accounts: Vec<Value> = entry
        .accounts
        .into_iter()
        .filter_map(|account| account.url.map(Value::String))
        .collect();

    let fields = json!({
        "display_name": entry.display_name,
        "username": entry.preferred_username,
        "location": entry.current_location,
        "profile_background": entry.profile_background.and_then(|b| b.url),
        "accounts": accounts,
    });

    match fields {
        Value::Object(map) => Ok(map),
        _ => Err(ProbeError::Parse("profile is not an object".to_string())),
    }
}

impl GravatarProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            avatar_base: AVATAR_BASE.to_string(),
            profile_base: PROFILE_BASE.to_string(),
        }
    }

    /// Points both the avatar and the profile lookups at `base`.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.avatar_base = base.clone();
        self.profile_base = base;
        self
    }

    async fn fetch_profile(&self, hash: &str) -> Option<ProbeData> {
        let url = join_url(&self.profile_base, &format!("{}.json", hash));
        let response = match self.client.get(&url, &[]).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("[Gravatar] Profile request failed: {}", e);
                return None;
            }
        };

        if response.status() != 200 {
            tracing::debug!("[Gravatar] No public profile (status {})", response.status());
            return None;
        }

        match parse_profile(&response) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("[Gravatar] Failed JSON parse: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Probe for GravatarProbe {
    fn name(&self) -> &str {
        NAME
    }

    async fn check(&self, email: &str) -> ProbeResult {
        tracing::debug!("[Gravatar] Checking {}", email);

        let hash = email_hash(email);
        let avatar_url = join_url(&self.avatar_base, &format!("avatar/{}", hash));
        let profile_url = join_url(&self.profile_base, &hash);

        let response = match self
            .client
            .get(&format!("{}?d=404&s=80", avatar_url), &[])
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("[Gravatar] Request failed for {}: {}", email, e);
                return e.into();
            }
        };

        match classify_avatar(&response) {
            AvatarStatus::Present { content_type } => {
                tracing::info!("[Gravatar] Profile found for {}", email);
                let mut data = evidence(
                    "avatar_found",
                    json!({
                        "avatar_url": avatar_url,
                        "profile_url": profile_url,
                        "email_hash": hash,
                        "content_type": content_type,
                    }),
                );
                if let Some(profile) = self.fetch_profile(&hash).await {
                    data.extend(profile);
                }
                ProbeResult::hit(data)
            }
            AvatarStatus::Absent => {
                tracing::debug!("[Gravatar] No profile for {}", email);
                ProbeResult::miss(Some(evidence(
                    "avatar_not_found",
                    json!({ "status_code": 404 }),
                )))
            }
            AvatarStatus::Unexpected {
                status,
                content_type,
            } => {
                tracing::warn!("[Gravatar] Unexpected status {} for {}", status, email);
                ProbeResult::unexpected(
                    ProbeError::UnexpectedStatus(status).to_string(),
                    Some(evidence(
                        format!("unexpected_status_{}", status),
                        json!({ "status_code": status, "content_type": content_type }),
                    )),
                )
            }
        }
    }
}
