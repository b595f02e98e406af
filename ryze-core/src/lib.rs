//! Core domain types for Ryze
//!
//! This crate holds the pieces every other Ryze crate builds on: the
//! scoped variable [`Context`], `${...}` template resolution, the
//! [`ConfigureItem`] merge contract and the [`SampleResult`] record.

pub mod configure;
pub mod context;
pub mod error;
pub mod functions;
pub mod json_path;
pub mod result;
pub mod template;
pub mod types;

// Re-export commonly used types at the crate root
pub use configure::ConfigureItem;
pub use context::{Context, Scope, ScopeGuard};
pub use error::{ConfigureError, ExtractionError, Result, RyzeError, TemplateError, ValidationError};
pub use functions::{FunctionRegistry, TemplateFunction};
pub use result::{AssertionOutcome, Failure, FailureKind, RealRequest, RealResponse, SampleResult};
pub use types::{ElementId, ElementKind, Phase, TestStatus};
