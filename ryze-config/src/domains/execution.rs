//! Engine execution policy

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Execution policy applied to every session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Fail on unresolved `${name}` placeholders instead of leaving them verbatim
    #[serde(default = "crate::domains::utils::default_true")]
    pub strict_variables: bool,

    /// What to do when an explicit configure reference is not visible
    #[serde(default)]
    pub missing_ref: MissingRefPolicy,

    /// Dispatch async processors in the background; when disabled they run
    /// inline but keep their failure isolation
    #[serde(default = "crate::domains::utils::default_true")]
    pub async_processors: bool,

    /// How long a session waits for background processors when drained
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_drain_timeout"
    )]
    pub drain_timeout: Duration,
}

/// Policy for explicit configure references that match nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingRefPolicy {
    /// Use the local configuration unmodified
    #[default]
    Ignore,
    /// Break the sampler with a configuration error
    Error,
}

impl FromStr for MissingRefPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(MissingRefPolicy::Ignore),
            "error" => Ok(MissingRefPolicy::Error),
            _ => Err(format!("Invalid missing_ref policy: {}", s)),
        }
    }
}

impl fmt::Display for MissingRefPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingRefPolicy::Ignore => f.write_str("ignore"),
            MissingRefPolicy::Error => f.write_str("error"),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strict_variables: true,
            missing_ref: MissingRefPolicy::default(),
            async_processors: true,
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.drain_timeout.as_secs(),
            "drain_timeout",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}
