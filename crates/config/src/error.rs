//! Configuration error types

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while reading or interpreting configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed
    #[error("error parsing configuration YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),

    /// A required option is missing
    #[error("segment '{segment}': missing required option '{option}'")]
    MissingOption { segment: String, option: String },

    /// An option holds a value outside its accepted set
    #[error("segment '{segment}': invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        segment: String,
        option: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Create a missing-option error
    pub fn missing(segment: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption {
            segment: segment.into(),
            option: option.into(),
        }
    }

    /// Create an invalid-option error
    pub fn invalid(
        segment: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            segment: segment.into(),
            option: option.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
