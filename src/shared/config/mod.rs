//! Offline core configuration
//!
//! Configuration comes from three layers, later ones winning:
//! defaults, an optional TOML file, then `TENANTDESK_*` environment variables.
//!
//! ```toml
//! database_path = "/var/lib/tenantdesk/offline.db"
//! remote_url = "https://project.example.co"
//! tenant_column = "business_id"
//! retry_base_secs = 2
//! retry_max_secs = 300
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default column used to scope remote rows by tenant
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";

/// Offline core configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// SQLite file for the local store; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Base URL of the hosted backend
    pub remote_url: Option<String>,
    /// Project API key sent as `apikey`
    pub api_key: Option<String>,
    /// Signed-in user's access token, sent as bearer when present
    pub access_token: Option<String>,
    /// Column holding the tenant id on every remote table
    pub tenant_column: String,
    /// Per-request timeout for the remote API
    pub request_timeout_secs: u64,
    /// First retry delay for a failed pending operation; 0 disables throttling
    pub retry_base_secs: u64,
    /// Upper bound for the retry delay
    pub retry_max_secs: u64,
    /// Downlink below this counts as a slow link
    pub slow_downlink_mbps: f64,
    /// Round-trip time above this counts as a slow link
    pub slow_rtt_ms: u32,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            remote_url: None,
            api_key: None,
            access_token: None,
            tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
            request_timeout_secs: 30,
            retry_base_secs: 2,
            retry_max_secs: 300,
            slow_downlink_mbps: 0.15,
            slow_rtt_ms: 1400,
        }
    }
}

impl OfflineConfig {
    /// Create a new OfflineConfigBuilder
    pub fn builder() -> OfflineConfigBuilder {
        OfflineConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("TENANTDESK_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("TENANTDESK_REMOTE_URL") {
            self.remote_url = Some(url);
        }
        if let Ok(key) = std::env::var("TENANTDESK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("TENANTDESK_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Ok(column) = std::env::var("TENANTDESK_TENANT_COLUMN") {
            self.tenant_column = column;
        }
        if let Ok(secs) = std::env::var("TENANTDESK_RETRY_BASE_SECS") {
            self.retry_base_secs = secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TENANTDESK_RETRY_BASE_SECS"))?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.tenant_column.trim().is_empty() {
            return Err(ConfigError::MissingValue("tenant_column"));
        }
        if self.retry_max_secs < self.retry_base_secs {
            return Err(ConfigError::InvalidValue("retry_max_secs"));
        }
        Ok(())
    }

    /// Remote base URL without a trailing slash
    pub fn remote_url(&self) -> Result<&str, ConfigError> {
        self.remote_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or(ConfigError::MissingValue("remote_url"))
    }

    /// Resolved database location
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => {
                let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
                path.push("tenantdesk");
                path.push("offline.db");
                path
            }
        }
    }
}

/// Builder for OfflineConfig
#[derive(Debug, Default)]
pub struct OfflineConfigBuilder {
    config: OfflineConfig,
}

impl OfflineConfigBuilder {
    /// Set the local database file
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Set the remote base URL
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_url = Some(url.into());
        self
    }

    /// Set the project API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the user access token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Set the tenant scoping column
    pub fn tenant_column(mut self, column: impl Into<String>) -> Self {
        self.config.tenant_column = column.into();
        self
    }

    /// Set the retry delay bounds; a zero base disables throttling
    pub fn retry_backoff(mut self, base_secs: u64, max_secs: u64) -> Self {
        self.config.retry_base_secs = base_secs;
        self.config.retry_max_secs = max_secs;
        self
    }

    /// Set the slow-link thresholds
    pub fn slow_link(mut self, downlink_mbps: f64, rtt_ms: u32) -> Self {
        self.config.slow_downlink_mbps = downlink_mbps;
        self.config.slow_rtt_ms = rtt_ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<OfflineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("cannot parse config: {0}")]
    Parse(String),
    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
}
