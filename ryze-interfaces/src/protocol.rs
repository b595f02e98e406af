//! Protocol adapter interface
//!
//! Each protocol module (HTTP, WebSocket, JDBC, ...) implements
//! [`ProtocolAdapter`] and is driven by the sampler lifecycle. The engine
//! never talks to a transport directly: it merges and evaluates the
//! adapter's configure item, asks the adapter to build a request, executes
//! it and hands the raw response back for formatting.

use async_trait::async_trait;
use ryze_core::{ConfigureItem, RealRequest, RealResponse};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by protocol adapters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Failed to build request: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProtocolError {
    /// Whether the request never left the process
    pub fn is_build_error(&self) -> bool {
        matches!(self, ProtocolError::Build(_))
    }
}

/// Core protocol interface consumed by samplers
///
/// `build` must be pure; `execute` is the only method expected to block on
/// I/O and owns socket-level timeouts and connection reuse.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync + 'static {
    /// Protocol specific configure item
    type Config: ConfigureItem;
    /// Request produced by [`ProtocolAdapter::build`]
    type Request: Send + Sync + 'static;
    /// Raw response produced by [`ProtocolAdapter::execute`]
    type Response: Send + 'static;

    /// Protocol name, used in logs and reports
    fn protocol(&self) -> &'static str;

    /// Build a request from an effective, fully evaluated configuration
    fn build(&self, config: &Self::Config) -> Result<Self::Request, ProtocolError>;

    /// Send the request and wait for the response
    async fn execute(&self, request: &Self::Request) -> Result<Self::Response, ProtocolError>;

    /// Render a request for reports
    fn format_request(&self, request: &Self::Request) -> RealRequest;

    /// Convert a raw response into the uniform result shape
    fn format_response(&self, response: Self::Response) -> Result<RealResponse, ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryze_core::{Context, TemplateError};

    #[derive(Debug, Clone, Default)]
    struct EchoConfig {
        message: Option<String>,
    }

    impl ConfigureItem for EchoConfig {
        const DEFAULT_REF: &'static str = "__echo_default__";

        fn ref_name(&self) -> Option<&str> {
            None
        }

        fn merge(&self, other: &Self) -> Self {
            Self {
                message: self.message.clone().or_else(|| other.message.clone()),
            }
        }

        fn evaluate(&self, ctx: &Context) -> Result<Self, TemplateError> {
            Ok(Self {
                message: ryze_core::configure::evaluate_string(ctx, &self.message)?,
            })
        }
    }

    struct EchoAdapter;

    #[async_trait]
    impl ProtocolAdapter for EchoAdapter {
        type Config = EchoConfig;
        type Request = String;
        type Response = String;

        fn protocol(&self) -> &'static str {
            "echo"
        }

        fn build(&self, config: &EchoConfig) -> Result<String, ProtocolError> {
            config
                .message
                .clone()
                .ok_or_else(|| ProtocolError::Build("message is required".to_string()))
        }

        async fn execute(&self, request: &String) -> Result<String, ProtocolError> {
            Ok(request.to_uppercase())
        }

        fn format_request(&self, request: &String) -> RealRequest {
            RealRequest::new(request.clone(), request.len())
        }

        fn format_response(&self, response: String) -> Result<RealResponse, ProtocolError> {
            Ok(RealResponse::new(response))
        }
    }

    #[tokio::test]
    async fn test_adapter_round() {
        let adapter = EchoAdapter;
        let request = adapter
            .build(&EchoConfig {
                message: Some("hi".to_string()),
            })
            .unwrap();
        let response = adapter.execute(&request).await.unwrap();
        let real = adapter.format_response(response).unwrap();
        assert_eq!(real.body_text(), "HI");
        assert_eq!(adapter.format_request(&request).size, 2);
    }

    #[test]
    fn test_build_error() {
        let err = EchoAdapter.build(&EchoConfig::default()).unwrap_err();
        assert!(err.is_build_error());
        assert_eq!(err.to_string(), "Failed to build request: message is required");
    }
}
