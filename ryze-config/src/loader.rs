//! Configuration loading and environment variable handling

use crate::domains::execution::{ExecutionConfig, MissingRefPolicy};
use crate::domains::http::HttpConfig;
use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::utils::parse_flag;
use crate::domains::RyzeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `RYZE` prefix
    pub fn new() -> Self {
        Self {
            prefix: "RYZE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<RyzeConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<RyzeConfig> {
        let mut config: RyzeConfig = if content.trim().is_empty() {
            RyzeConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<RyzeConfig> {
        let mut config = RyzeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<RyzeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut RyzeConfig) -> ConfigResult<()> {
        self.apply_execution_overrides(&mut config.execution)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_execution_overrides(&self, config: &mut ExecutionConfig) -> ConfigResult<()> {
        if let Some(strict) = self.get_flag("STRICT_VARIABLES")? {
            config.strict_variables = strict;
        }

        if let Some(enabled) = self.get_flag("ASYNC_PROCESSORS")? {
            config.async_processors = enabled;
        }

        if let Ok(policy) = self.get_env_var("MISSING_REF") {
            config.missing_ref = MissingRefPolicy::from_str(&policy).map_err(ConfigError::EnvError)?;
        }

        if let Some(timeout) = self.get_seconds("DRAIN_TIMEOUT")? {
            config.drain_timeout = timeout;
        }

        Ok(())
    }

    fn apply_http_overrides(&self, config: &mut HttpConfig) -> ConfigResult<()> {
        if let Some(timeout) = self.get_seconds("HTTP_TIMEOUT")? {
            config.timeout = timeout;
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(verify_ssl) = self.get_flag("HTTP_VERIFY_SSL")? {
            config.verify_ssl = verify_ssl;
        }

        if let Ok(redirects) = self.get_env_var("HTTP_MAX_REDIRECTS") {
            config.max_redirects = redirects
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_MAX_REDIRECTS: {}", e)))?;
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn get_flag(&self, name: &str) -> ConfigResult<Option<bool>> {
        match self.get_env_var(name) {
            Ok(raw) => parse_flag(&raw)
                .map(Some)
                .ok_or_else(|| ConfigError::EnvError(format!("Invalid {}: {}", name, raw))),
            Err(_) => Ok(None),
        }
    }

    fn get_seconds(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(raw) => {
                let seconds: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))?;
                Ok(Some(Duration::from_secs(seconds)))
            }
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
