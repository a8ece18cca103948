//! Configuration file parsing and structures.
//!
//! omadad uses TOML for declarative configuration. Each integration owns a
//! table under `[integrations]`; integrations that manage several instances
//! (like Omada controllers) key them by config entry id.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use crate::integrations::omada::OmadaConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,
}

fn default_interval_secs() -> u64 {
    30
}

/// System-wide configuration
#[derive(Debug, Deserialize)]
pub struct SystemConfig {
    /// How often integrations refresh their remote data, in seconds
    #[serde(default = "default_interval_secs")]
    pub scan_interval_secs: u64,

    /// How often polled entities (sensors) are updated, in seconds
    #[serde(default = "default_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_interval_secs(),
            poll_interval_secs: default_interval_secs(),
        }
    }
}

impl SystemConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Omada controllers, keyed by config entry id
    #[serde(default)]
    pub omada: BTreeMap<String, OmadaConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "system.scan_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.system.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "system.poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        for (entry_id, omada) in &self.integrations.omada {
            omada
                .validate()
                .map_err(|msg| ConfigError::Invalid(format!("integrations.omada.{}: {}", entry_id, msg)))?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
