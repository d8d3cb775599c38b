//! Filter error types

use thiserror::Error;

/// Errors from parsing or evaluating a filter expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The expression text is not well-formed
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The expression is well-formed but meaningless
    #[error("semantic error: {0}")]
    Semantic(String),
}

impl FilterError {
    /// Create a syntax error
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    /// Create a semantic error
    pub fn semantic(msg: impl Into<String>) -> Self {
        Self::Semantic(msg.into())
    }
}
