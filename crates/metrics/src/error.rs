//! Metrics error types

use thiserror::Error;

/// Errors from the accounting database and its HTTP exposure
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A window parameter holds an unusable value
    #[error("invalid value for '{param}': {reason}")]
    InvalidParam { param: String, reason: String },

    /// Registering a collector with the Prometheus registry failed
    #[error("metrics registration failed: {0}")]
    Registration(#[from] prometheus::Error),

    /// The exposure endpoint could not be bound
    #[error("cannot bind metrics endpoint '{endpoint}': {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

impl MetricsError {
    /// Create an invalid-parameter error
    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            param: param.into(),
            reason: reason.into(),
        }
    }
}
