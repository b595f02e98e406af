//! HTTP protocol adapter for Ryze
//!
//! Provides the [`HttpConfigureItem`] configuration, the [`HttpAdapter`]
//! used by HTTP samplers and an offline mock mode for tests.

pub mod adapter;
pub mod errors;
pub mod item;
pub mod types;

// Re-export main types for convenience
pub use adapter::{HttpAdapter, KEYWORDS};
pub use errors::HttpError;
pub use item::{HttpConfigureItem, DEFAULT_REF};
pub use types::{HttpBody, HttpMethod, HttpMethodError, HttpRequest, HttpResponse, MockResponse};
