//! # Ryze Interfaces
//!
//! Contracts between the execution engine and its external collaborators.
//!
//! - [`ProtocolAdapter`] - implemented by every protocol module
//! - [`ReportListener`] - step-tracing hooks for reporting integrations

pub mod listener;
pub mod protocol;

// Re-export commonly used types
pub use listener::{CompositeListener, NoopListener, ReportListener, StepInfo};
pub use protocol::{ProtocolAdapter, ProtocolError};
