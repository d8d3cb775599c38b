//! Flow codec error types

use thiserror::Error;

/// Errors from the flow JSON line codec
#[derive(Debug, Error)]
pub enum FlowError {
    /// Failed to encode a flow as JSON
    #[error("failed to encode flow: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode a flow from JSON
    #[error("failed to decode flow: {0}")]
    Decode(#[source] serde_json::Error),
}
