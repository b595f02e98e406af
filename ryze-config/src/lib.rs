//! Domain-driven configuration for the Ryze engine
//!
//! Configuration is split by functional domain (execution policy, HTTP
//! adapter, logging), loaded from YAML and overridden by `RYZE_*`
//! environment variables.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    execution::{ExecutionConfig, MissingRefPolicy},
    http::{HttpConfig, PoolConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    RyzeConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
