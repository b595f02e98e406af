//! Engine error types

use ryze_core::ValidationError;
use thiserror::Error;

/// Result type for document building
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while turning a document tree into executable elements
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Node has no testclass keyword")]
    MissingKeyword,

    #[error("Unknown testclass keyword: {0}")]
    UnknownKeyword(String),

    #[error("Keyword '{keyword}' cannot be used as a {expected}")]
    WrongRole {
        keyword: String,
        expected: &'static str,
    },

    #[error("Malformed '{keyword}' node: {message}")]
    Malformed { keyword: String, message: String },

    #[error("Invalid element definition: {0}")]
    Invalid(#[from] ValidationError),
}

impl RegistryError {
    pub(crate) fn malformed(keyword: &str, message: impl ToString) -> Self {
        RegistryError::Malformed {
            keyword: keyword.to_string(),
            message: message.to_string(),
        }
    }
}
