use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Free-form evidence attached to a probe result.
pub type ProbeData = Map<String, Value>;

/// Outcome of one probe invocation.
///
/// `found` is `Some(true)`, `Some(false)` or `None` (ambiguous). A result that
/// carries an error is never a hit; the constructors below are the only way
/// to build one, so that rule always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    found: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ProbeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProbeResult {
    /// The service knows the address.
    pub fn hit(data: ProbeData) -> Self {
        Self {
            found: Some(true),
            data: Some(data),
            error: None,
        }
    }

    /// The service reported that the address is not registered.
    pub fn miss(data: Option<ProbeData>) -> Self {
        Self {
            found: Some(false),
            data,
            error: None,
        }
    }

    /// The service answered, but the answer does not reveal anything.
    pub fn ambiguous(data: ProbeData) -> Self {
        Self {
            found: None,
            data: Some(data),
            error: None,
        }
    }

    /// The service answered in a way the probe could not interpret.
    pub fn unexpected(error: impl Into<String>, data: Option<ProbeData>) -> Self {
        Self {
            found: None,
            data,
            error: Some(error.into()),
        }
    }

    /// The check itself failed (network, parse or internal error).
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            found: Some(false),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn found(&self) -> Option<bool> {
        self.found
    }

    pub fn is_hit(&self) -> bool {
        self.found == Some(true)
    }

    pub fn data(&self) -> Option<&ProbeData> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Name of the decision rule that produced this result, if the probe recorded one.
    pub fn evidence(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get("evidence"))
            .and_then(Value::as_str)
    }
}

/// Builds a data map whose `evidence` key names the rule that fired.
///
/// `extra` is merged in when it is a JSON object; other values are ignored.
pub fn evidence(rule: impl Into<String>, extra: Value) -> ProbeData {
    let mut data = Map::new();
    data.insert("evidence".to_string(), Value::String(rule.into()));
    if let Value::Object(fields) = extra {
        data.extend(fields);
    }
    data
}

/// Why a single check could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Probe error: {0}")]
    Internal(String),

    #[error("Scan cancelled")]
    Cancelled,
}

impl From<ProbeError> for ProbeResult {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::UnexpectedStatus(status) => ProbeResult::unexpected(
                err.to_string(),
                Some(evidence(
                    format!("unexpected_status_{}", status),
                    serde_json::json!({ "status_code": status }),
                )),
            ),
            ProbeError::Cancelled => ProbeResult::unexpected(err.to_string(), None),
            other => ProbeResult::failed(other.to_string()),
        }
    }
}

/// Request policy shared by the HTTP client and every probe of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbePolicy {
    pub timeout: Duration,
    pub rate_limit: Duration,
    pub user_agent: String,
    pub max_retries: u32,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            rate_limit: Duration::from_secs(1),
            user_agent: "DigTool/1.0 (OSINT Scanner)".to_string(),
            max_retries: 2,
        }
    }
}

/// Results of one scan keyed by probe name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    results: BTreeMap<String, ProbeResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result for `name`. The first result recorded for a name wins.
    pub(crate) fn insert(&mut self, name: String, result: ProbeResult) -> bool {
        if self.results.contains_key(&name) {
            return false;
        }
        self.results.insert(name, result);
        true
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.results.get(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn found_count(&self) -> usize {
        self.results.values().filter(|r| r.is_hit()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.values().filter(|r| r.error().is_some()).count()
    }

    pub fn into_inner(self) -> BTreeMap<String, ProbeResult> {
        self.results
    }
}

impl IntoIterator for ResultSet {
    type Item = (String, ProbeResult);
    type IntoIter = std::collections::btree_map::IntoIter<String, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
