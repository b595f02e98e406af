//! HTTP adapter configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Client settings shared by every HTTP sampler of a run
///
/// Per-request settings (host, path, headers, timeout) live on the HTTP
/// configure item instead; these only shape the underlying client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout, unless a configure item sets `timeout_ms`
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub connect_timeout: Duration,

    pub max_redirects: u32,

    pub user_agent: String,

    /// Set to false to accept self-signed certificates in test environments
    pub verify_ssl: bool,

    /// Headers added to every request that does not set them itself
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default_headers: BTreeMap<String, String>,

    pub pool: PoolConfig,
}

/// Keep-alive pool of the shared client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle_per_host: usize,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub idle_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: format!("Ryze/{}", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
            default_headers: BTreeMap::new(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        validate_positive(self.connect_timeout.as_secs(), "connect_timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        for name in self.default_headers.keys() {
            validate_required_string(name, "default_headers", self.domain_name())?;
        }
        self.pool.validate()
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

impl Validatable for PoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.idle_timeout.as_secs(), "idle_timeout", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "http.pool"
    }
}
