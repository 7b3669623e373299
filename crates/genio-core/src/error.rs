//! Error types for Genio core operations.

use crate::ids::IdError;

/// Result type for Genio core operations.
pub type Result<T> = std::result::Result<T, GenioError>;

/// Errors raised while validating and pricing generation requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenioError {
    /// A request field is missing, empty or outside its allowed range.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pricing input is outside the domain of the pricing tables.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl GenioError {
    /// Shorthand for a [`GenioError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a [`GenioError::InvalidParameter`].
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
