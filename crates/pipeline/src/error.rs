//! Pipeline error types

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while assembling a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The spec names a segment nobody registered
    #[error("unknown segment '{name}', available: [{available}]")]
    UnknownSegment { name: String, available: String },

    /// A structural configuration problem
    #[error(transparent)]
    Config(#[from] flowline_config::ConfigError),

    /// A segment could not be constructed from its options
    #[error("segment '{segment}': {message}")]
    Construction { segment: String, message: String },
}

impl PipelineError {
    /// Create a construction error
    pub fn construction(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            segment: segment.into(),
            message: message.into(),
        }
    }
}
