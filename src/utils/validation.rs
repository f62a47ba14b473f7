use crate::utils::error::{DigError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(DigError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(DigError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(DigError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(DigError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DigError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN compares false both ways, so reject it explicitly.
    if !(value >= min && value <= max) {
        return Err(DigError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("endpoints.gravatar", "https://example.com").is_ok());
        assert!(validate_url("endpoints.gravatar", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("endpoints.gravatar", "").is_err());
        assert!(validate_url("endpoints.gravatar", "invalid-url").is_err());
        assert!(validate_url("endpoints.gravatar", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_workers", 5, 1).is_ok());
        assert!(validate_positive_number("max_workers", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("rate_limit_seconds", 0.0, 0.0, 60.0).is_ok());
        assert!(validate_range("rate_limit_seconds", -0.5, 0.0, 60.0).is_err());
        assert!(validate_range("rate_limit_seconds", f64::NAN, 0.0, 60.0).is_err());
        assert!(validate_range("max_retries", 11u32, 0, 10).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("user_agent", "DigTool/1.0").is_ok());
        assert!(validate_non_empty_string("user_agent", "   ").is_err());
    }
}
