//! Configuration for the ECG session client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::WINDOW_SIZE;

/// Main configuration for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the acquisition and analysis service lives
    pub service: ServiceConfig,

    /// Samples per chart segment
    pub window_size: usize,

    /// Unattended collection cap, after which the session stops itself
    #[serde(with = "duration_serde")]
    pub collection_timeout: Duration,

    /// Pause between streaming reconnect attempts
    #[serde(with = "duration_serde")]
    pub reconnect_delay: Duration,

    /// What to do with start/stop commands issued while disconnected
    pub command_policy: CommandPolicy,

    /// Upper bound on commands held for a reconnect
    pub max_queued_commands: usize,

    /// Directory for exported session snapshots
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecg-session-client");

        Self {
            service: ServiceConfig::default(),
            window_size: WINDOW_SIZE,
            collection_timeout: Duration::from_secs(120),
            reconnect_delay: Duration::from_secs(3),
            command_policy: CommandPolicy::Queue,
            max_queued_commands: 16,
            export_path: data_dir.join("exports"),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecg-session-client")
            .join("config.json")
    }

    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be at least 1".into()));
        }
        if self.collection_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "collection_timeout must be greater than zero".into(),
            ));
        }
        if self.service.host.trim().is_empty() {
            return Err(ConfigError::Invalid("service.host must not be empty".into()));
        }
        Ok(())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Address and endpoint paths of the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Websocket path for the live stream
    pub stream_path: String,
    /// Recorded dataset (delimited text)
    pub dataset_path: String,
    /// Summary metrics (JSON)
    pub summary_path: String,
    /// Per-request timeout for the HTTP endpoints
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            stream_path: "/ws".to_string(),
            dataset_path: "/ecg_data.csv".to_string(),
            summary_path: "/summarize_ecg".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    /// Create a configuration for `host:port` with the default paths.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Get the base HTTP URL.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn dataset_url(&self) -> String {
        format!("{}{}", self.url(), self.dataset_path)
    }

    pub fn summary_url(&self) -> String {
        format!("{}{}", self.url(), self.summary_path)
    }

    pub fn stream_url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.stream_path)
    }
}

/// Handling of commands issued while the stream is disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    /// Hold commands and send them once reconnected
    #[default]
    Queue,
    /// Discard them
    Drop,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
