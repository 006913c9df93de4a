//! Application configuration module
//!
//! Provides the configuration shared by the sync agent and its library
//! consumers: where the remote API lives, where the durable queue is stored,
//! and how often the background timers fire.
//!
//! Values can come from a TOML file (every key optional):
//!
//! ```toml
//! api_url = "https://api.complisite.example"
//! database_path = "/var/lib/complisite/queue.db"
//! sync_interval_secs = 30
//! gc_interval_secs = 3600
//! probe_interval_secs = 15
//! max_pending_mutations = 5000
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default remote API base URL
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_GC_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Upper bound for every interval setting (30 days)
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Remote API base URL
    pub api_url: String,
    /// Bearer token sent with every remote call
    pub api_token: Option<String>,
    /// Location of the SQLite queue file; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Periodic drain interval while online
    pub sync_interval_secs: u64,
    /// Interval between garbage collection of synced records
    pub gc_interval_secs: u64,
    /// Interval between connectivity probes
    pub probe_interval_secs: u64,
    /// Upper bound on unsynced records kept on the device
    pub max_pending_mutations: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            database_path: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            max_pending_mutations: None,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }
        for (field, value) in [
            ("sync_interval_secs", self.sync_interval_secs),
            ("gc_interval_secs", self.gc_interval_secs),
            ("probe_interval_secs", self.probe_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
            if value > MAX_INTERVAL_SECS {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be at most {} seconds", MAX_INTERVAL_SECS),
                ));
            }
        }
        if self.max_pending_mutations == Some(0) {
            return Err(ConfigError::invalid(
                "max_pending_mutations",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// Builder for AppConfig
///
/// Starts from an existing configuration (defaults unless given) and
/// overrides individual fields.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    base: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration instead of the defaults
    pub fn from_config(base: AppConfig) -> Self {
        Self { base }
    }

    /// Set the remote API URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.base.api_url = url.into();
        self
    }

    /// Set the bearer token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.base.api_token = Some(token.into());
        self
    }

    /// Set the queue database location
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base.database_path = Some(path.into());
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.base.sync_interval_secs = secs;
        self
    }

    pub fn gc_interval_secs(mut self, secs: u64) -> Self {
        self.base.gc_interval_secs = secs;
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.base.probe_interval_secs = secs;
        self
    }

    /// Cap the number of unsynced mutations kept on the device
    pub fn max_pending_mutations(mut self, limit: usize) -> Self {
        self.base.max_pending_mutations = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.base.validate()?;
        Ok(self.base)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
