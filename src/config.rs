//! Configuration loading.
//!
//! A single TOML file, path given on the command line. Per-guild settings
//! (lobby channel, categories) are NOT here — they live in the database and
//! are created by the `setup` command, so there is no process-wide default
//! lobby to fall back on.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP edge configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Platform room API client configuration.
    pub remote: RemoteConfig,
    /// Background reconciler configuration.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP edge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port for the event ingress, command surface, /healthz and /metrics.
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for ephemeral runs).
    pub path: String,
}

/// Platform room API client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the platform's REST API.
    pub base_url: String,
    /// Bearer token for the bot account.
    pub token: String,
    /// Per-request timeout in milliseconds (default: 5000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Pause before the single retry of a transient failure (default: 250).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Background reconciler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Whether the periodic sweep runs at all. The `cleanup` command works
    /// either way.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps (default: 300).
    #[serde(default = "default_reconcile_interval_secs")]
    pub interval_secs: u64,
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_reconcile_interval_secs(),
        }
    }
}

fn default_listen_port() -> u16 {
    8130
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}
