use crate::adapters::probes::SiteTemplate;
use crate::core::registry::ProbeRegistry;
use crate::domain::model::ProbePolicy;
use crate::utils::error::{DigError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "digtool.toml";

/// Scan settings, read from a TOML file or defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigConfig {
    #[serde(alias = "timeout")]
    pub timeout_seconds: u64,
    #[serde(alias = "rate_limit")]
    pub rate_limit_seconds: f64,
    pub user_agent: String,
    pub max_retries: u32,
    pub max_workers: usize,
    /// Probes to run; empty runs every registered probe.
    pub modules: Vec<String>,
    pub verbose: bool,
    /// Per-probe overrides, one `[probes.<name>]` table each.
    pub probes: HashMap<String, ProbeConfig>,
    /// Extra password-reset style sites, registered under their own names.
    pub templates: Vec<TemplateConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    pub name: String,
    pub base_url: String,
    pub reset_page: Option<String>,
    pub reset_endpoint: Option<String>,
    pub profile_path: Option<String>,
    pub sent_pattern: Option<String>,
    pub ambiguous_pattern: Option<String>,
}

impl Default for DigConfig {
    fn default() -> Self {
        let policy = ProbePolicy::default();
        Self {
            timeout_seconds: policy.timeout.as_secs(),
            rate_limit_seconds: policy.rate_limit.as_secs_f64(),
            user_agent: policy.user_agent,
            max_retries: policy.max_retries,
            max_workers: crate::core::engine::DEFAULT_MAX_WORKERS,
            modules: Vec::new(),
            verbose: false,
            probes: HashMap::new(),
            templates: Vec::new(),
        }
    }
}

impl TemplateConfig {
    pub fn to_site(&self) -> Result<SiteTemplate> {
        let mut site = SiteTemplate::new(&self.name, &self.base_url);
        if let Some(path) = &self.reset_page {
            site = site.with_reset_page(path);
        }
        if let Some(path) = &self.reset_endpoint {
            site = site.with_reset_endpoint(path);
        }
        if let Some(path) = &self.profile_path {
            site = site.with_profile_path(path);
        }
        if let Some(pattern) = &self.sent_pattern {
            site = site.with_sent_pattern(pattern)?;
        }
        if let Some(pattern) = &self.ambiguous_pattern {
            site = site.with_ambiguous_pattern(pattern)?;
        }
        Ok(site)
    }
}

impl DigConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DigError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Reads `path` if it exists, otherwise falls back to the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DigError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the value of the environment variable; unset
    /// variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DigError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;
        validate_range("rate_limit_seconds", self.rate_limit_seconds, 0.0, 3600.0)?;
        validate_range("max_retries", self.max_retries, 0, 10)?;
        validate_positive_number("max_workers", self.max_workers, 1)?;
        validate_non_empty_string("user_agent", &self.user_agent)?;

        let builtin = ProbeRegistry::builtin();
        for (name, probe) in &self.probes {
            if !builtin.contains(name) {
                return Err(DigError::InvalidConfigValueError {
                    field: format!("probes.{}", name),
                    value: probe.base_url.clone(),
                    reason: format!(
                        "no built-in probe is named '{}' (known: {})",
                        name,
                        builtin.names().collect::<Vec<_>>().join(", ")
                    ),
                });
            }
            validate_url(&format!("probes.{}.base_url", name), &probe.base_url)?;
        }

        for template in &self.templates {
            if template.name.trim().is_empty() {
                return Err(DigError::MissingConfigError {
                    field: format!("templates.name (base_url {})", template.base_url),
                });
            }
            validate_url(&format!("templates.{}.base_url", template.name), &template.base_url)?;
            template.to_site()?;
        }

        Ok(())
    }

    pub fn policy(&self) -> ProbePolicy {
        ProbePolicy {
            timeout: Duration::from_secs(self.timeout_seconds),
            rate_limit: Duration::try_from_secs_f64(self.rate_limit_seconds).unwrap_or_default(),
            user_agent: self.user_agent.clone(),
            max_retries: self.max_retries,
        }
    }

    /// Built-in probes (with base URL overrides) plus the configured templates.
    pub fn build_registry(&self) -> Result<ProbeRegistry> {
        let base_urls: HashMap<String, String> = self
            .probes
            .iter()
            .map(|(name, probe)| (name.clone(), probe.base_url.clone()))
            .collect();
        let mut registry = ProbeRegistry::builtin_with_base_urls(&base_urls);
        for template in &self.templates {
            registry.register_template(template.to_site()?);
        }
        Ok(registry)
    }
}

impl Validate for DigConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
