//! Core error types for Ryze

use thiserror::Error;

/// Core error type for all Ryze errors
#[derive(Debug, Error)]
pub enum RyzeError {
    /// Template resolution errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Configure item lookup and merge errors
    #[error("Configure error: {0}")]
    Configure(#[from] ConfigureError),

    /// Extractor errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Definition-time validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Ryze
pub type Result<T> = std::result::Result<T, RyzeError>;

/// Errors raised while resolving `${...}` templates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Unresolved variable: ${{{0}}}")]
    Unresolved(String),

    #[error("Unknown template function: {0}")]
    UnknownFunction(String),

    #[error("Template function {name} failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("Malformed template: {0}")]
    Malformed(String),
}

/// Errors raised by the configure element registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigureError {
    #[error("Configure element '{ref_name}' is not a {expected} configuration")]
    TypeMismatch {
        ref_name: String,
        expected: &'static str,
    },

    #[error("Configure element not found: {0}")]
    MissingRef(String),

    #[error("Invalid configure reference: {0}")]
    InvalidRef(String),
}

/// Errors raised while running an extractor against a result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("No value at path {path}")]
    PathNotFound { path: String },

    #[error("Pattern {pattern} matched nothing")]
    NoMatch { pattern: String },

    #[error("Header not present: {0}")]
    MissingHeader(String),

    #[error("Response body is not JSON")]
    NotJson,

    #[error("No response available")]
    NoResponse,

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
}

/// Definition-time validation errors for extractors, assertions and elements
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl RyzeError {
    /// Get a stable error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            RyzeError::Template(TemplateError::Unresolved(_)) => "UNRESOLVED_VARIABLE",
            RyzeError::Template(_) => "TEMPLATE_ERROR",
            RyzeError::Configure(ConfigureError::TypeMismatch { .. }) => "CONFIG_TYPE_MISMATCH",
            RyzeError::Configure(_) => "CONFIG_ERROR",
            RyzeError::Extraction(_) => "EXTRACTION_ERROR",
            RyzeError::Validation(_) => "VALIDATION_ERROR",
            RyzeError::Serialization(_) => "SERIALIZATION_ERROR",
            RyzeError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error happens before any protocol call is attempted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RyzeError::Template(_) | RyzeError::Configure(_) | RyzeError::Validation(_)
        )
    }
}
