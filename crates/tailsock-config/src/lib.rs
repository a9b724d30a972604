#![deny(unsafe_code)]

//! Configuration loading and validation for tailsock.
//!
//! Loads TOML configuration files and validates them against expected
//! schemas. Provides the [`ClientConfig`] type as the central configuration
//! structure consumed by the CLI; library users configure the core builder
//! directly and never touch TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level client configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport selection.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Startup-probe retry budget.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport selection knobs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Daemon socket path override. Unset means the platform default.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Force the Unix socket even on macOS (skip credential discovery).
    #[serde(default)]
    pub socket_only: bool,
}

/// Startup-probe retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Retries after the initial attempt.
    #[serde(default = "default_probe_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds; later delays grow by ×1.5.
    #[serde(default = "default_probe_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_retries: default_probe_retries(),
            base_delay_ms: default_probe_base_delay_ms(),
        }
    }
}

fn default_probe_retries() -> u32 {
    5
}

fn default_probe_base_delay_ms() -> u64 {
    5000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter: "error", "warn", "info", "debug", or "trace".
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on IO failure, TOML syntax errors, or
    /// validation failures.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.max_retries == 0 {
            return Err(ConfigError::Validation(
                "probe.max_retries must be greater than zero".to_string(),
            ));
        }
        if self.probe.base_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "probe.base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(path) = &self.transport.socket_path
            && path.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "transport.socket_path must not be empty when set".to_string(),
            ));
        }
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "logging.level must be a tracing level, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.probe.max_retries, 5);
        assert_eq!(config.probe.base_delay_ms, 5000);
        assert_eq!(config.logging.level, "info");
        assert!(config.transport.socket_path.is_none());
        assert!(!config.transport.socket_only);
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config.probe.max_retries, 5);
    }

    #[test]
    fn full_toml_round_trips() {
        let config = ClientConfig::parse(
            r#"
            [transport]
            socket_path = "/run/tailscale/tailscaled.sock"
            socket_only = true

            [probe]
            max_retries = 2
            base_delay_ms = 100

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.transport.socket_path.as_deref(),
            Some("/run/tailscale/tailscaled.sock")
        );
        assert!(config.transport.socket_only);
        assert_eq!(config.probe.max_retries, 2);
        assert_eq!(config.probe.base_delay_ms, 100);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn zero_max_retries_rejected() {
        let err = ClientConfig::parse("[probe]\nmax_retries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_base_delay_rejected() {
        let err = ClientConfig::parse("[probe]\nbase_delay_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn empty_socket_path_rejected() {
        let err = ClientConfig::parse("[transport]\nsocket_path = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn bogus_log_level_rejected() {
        let err = ClientConfig::parse("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tailsock.toml");
        std::fs::write(&path, "[probe]\nmax_retries = 1\n").unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.probe.max_retries, 1);
    }
}
