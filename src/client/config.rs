//! Device configuration
//!
//! `Config` wraps the shared `AppConfig` with the layering the agent needs
//! (defaults, then an optional TOML file, then `COMPLISITE_*` variables) and
//! holds the bearer token separately so it can be swapped at runtime.

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "COMPLISITE_API_URL";
pub const ENV_API_TOKEN: &str = "COMPLISITE_API_TOKEN";
pub const ENV_DB_PATH: &str = "COMPLISITE_DB_PATH";
pub const ENV_SYNC_INTERVAL: &str = "COMPLISITE_SYNC_INTERVAL_SECS";
pub const ENV_GC_INTERVAL: &str = "COMPLISITE_GC_INTERVAL_SECS";
pub const ENV_MAX_PENDING: &str = "COMPLISITE_MAX_PENDING";

/// Device-side configuration wrapper.
///
/// Layers, lowest precedence first: defaults, optional TOML file,
/// `COMPLISITE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let app = AppConfig::default();
        let token = app.api_token.clone();
        Self { app, token }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self::from_app(builder.build()?))
    }

    pub fn from_app(app: AppConfig) -> Self {
        let token = app.api_token.clone();
        Self { app, token }
    }

    /// Defaults, then `file` if given, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        let builder = apply_env(AppConfigBuilder::from_config(base))?;
        Self::with_builder(builder)
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.api_url.trim_end_matches('/')
    }

    /// Configured queue location, or the platform default
    pub fn database_path(&self) -> PathBuf {
        self.app
            .database_path
            .clone()
            .unwrap_or_else(crate::client::local_db::LocalDatabase::default_path)
    }

    pub fn max_pending_mutations(&self) -> Option<usize> {
        self.app.max_pending_mutations
    }

    pub fn sync_interval(&self) -> Duration {
        self.app.sync_interval()
    }

    pub fn gc_interval(&self) -> Duration {
        self.app.gc_interval()
    }

    pub fn probe_interval(&self) -> Duration {
        self.app.probe_interval()
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }
}

fn apply_env(mut builder: AppConfigBuilder) -> Result<AppConfigBuilder, ConfigError> {
    if let Some(url) = env_var(ENV_API_URL) {
        builder = builder.api_url(url);
    }
    if let Some(token) = env_var(ENV_API_TOKEN) {
        builder = builder.api_token(token);
    }
    if let Some(path) = env_var(ENV_DB_PATH) {
        builder = builder.database_path(path);
    }
    if let Some(secs) = env_parse::<u64>(ENV_SYNC_INTERVAL, "sync_interval_secs")? {
        builder = builder.sync_interval_secs(secs);
    }
    if let Some(secs) = env_parse::<u64>(ENV_GC_INTERVAL, "gc_interval_secs")? {
        builder = builder.gc_interval_secs(secs);
    }
    if let Some(limit) = env_parse::<usize>(ENV_MAX_PENDING, "max_pending_mutations")? {
        builder = builder.max_pending_mutations(limit);
    }
    Ok(builder)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(
    name: &str,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(field, format!("{}={} is not a number", name, raw))),
        None => Ok(None),
    }
}
