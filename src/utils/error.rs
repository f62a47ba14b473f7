use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigError {
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Output encoding error: {message}")]
    OutputEncodingError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid scan input: {message}")]
    InvalidInputError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Output,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DigError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DigError::ConfigError { .. }
            | DigError::ConfigValidationError { .. }
            | DigError::MissingConfigError { .. }
            | DigError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            DigError::HttpClientError(_) => ErrorCategory::Network,
            DigError::CsvError(_)
            | DigError::IoError(_)
            | DigError::SerializationError(_)
            | DigError::OutputEncodingError { .. } => ErrorCategory::Output,
            DigError::InvalidInputError { .. } => ErrorCategory::Input,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Medium,
            ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DigError::ConfigError { .. } | DigError::ConfigValidationError { .. } => {
                "Check that the configuration file is valid TOML"
            }
            DigError::MissingConfigError { .. } => {
                "Add the missing field to the configuration file"
            }
            DigError::InvalidConfigValueError { .. } => {
                "Fix the reported value in the configuration file or on the command line"
            }
            DigError::HttpClientError(_) => {
                "The HTTP client could not be built; check TLS support and the user agent string"
            }
            DigError::CsvError(_) | DigError::IoError(_) | DigError::SerializationError(_) => {
                "Check that stdout is writable"
            }
            DigError::OutputEncodingError { .. } => {
                "Pick another --format; the report could not be encoded as text"
            }
            DigError::InvalidInputError { .. } => "Pass a non-empty email address",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network setup problem: {}", self),
            ErrorCategory::Output => format!("Could not write results: {}", self),
            ErrorCategory::Input => format!("Bad input: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = DigError::InvalidConfigValueError {
            field: "max_workers".to_string(),
            value: "0".to_string(),
            reason: "Value must be at least 1".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("max_workers"));
    }

    #[test]
    fn test_encoding_errors_are_output_errors() {
        let err = DigError::OutputEncodingError {
            message: "CSV output is not UTF-8".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Output);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().starts_with("Could not write results"));
    }

    #[test]
    fn test_input_error_message() {
        let err = DigError::InvalidInputError {
            message: "email is empty".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid scan input: email is empty");
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }
}
