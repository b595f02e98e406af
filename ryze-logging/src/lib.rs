//! Logging setup for Ryze
//!
//! Every Ryze crate logs through `tracing`; this crate installs the global
//! `tracing-subscriber` from a [`LoggingConfig`](ryze_config::LoggingConfig).
//! Installation is idempotent: when a subscriber already exists the call is
//! a no-op.

pub mod init;

pub use init::{active_format, build_env_filter, init_logging_from_config, init_simple_tracing, init_test_tracing};
