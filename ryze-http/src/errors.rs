//! HTTP error types

use crate::types::HttpMethodError;
use ryze_interfaces::ProtocolError;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(#[from] HttpMethodError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No mock response for {method} {url}")]
    NoMock { method: String, url: String },
}

impl From<HttpError> for ProtocolError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::InvalidMethod(_)
            | HttpError::InvalidUrl(_)
            | HttpError::MissingField(_)
            | HttpError::InvalidJson(_)
            | HttpError::ConfigError(_) => ProtocolError::Build(error.to_string()),
            HttpError::NetworkError(_) | HttpError::NoMock { .. } => {
                ProtocolError::Transport(error.to_string())
            }
        }
    }
}
