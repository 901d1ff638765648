//! Configuration loading for tasksync.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional TOML file, and `TASKSYNC_*` environment variables. The merged
//! result is validated before anything is constructed from it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the remote task service.
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.jsonbin.io/";

/// Default latency injected before the remote branch of a merged fetch.
pub const DEFAULT_REMOTE_DELAY_MS: u64 = 100;

/// Default remote request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSyncConfig {
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
}

/// Remote task service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Bin holding the full task collection.
    pub collection_bin: String,
    /// Sent as the `secret-key` header on collection requests.
    pub secret_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            collection_bin: "5d66b3a2a42e3b278d17b1a3".to_string(),
            secret_key: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Local durable store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// LMDB environment directory. `None` selects the in-memory store.
    pub path: Option<PathBuf>,
    pub max_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_size_mb: 64,
        }
    }
}

/// Reconciliation engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub remote_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_delay_ms: DEFAULT_REMOTE_DELAY_MS,
        }
    }
}

impl SyncConfig {
    pub fn remote_delay(&self) -> Duration {
        Duration::from_millis(self.remote_delay_ms)
    }
}

impl TaskSyncConfig {
    /// Load from an optional file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let mut config = Self::from_path(path)?;
                config.apply_env();
                config
            }
            None => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// Environment variables:
    /// - `TASKSYNC_REMOTE_BASE_URL`
    /// - `TASKSYNC_REMOTE_BIN_ID`
    /// - `TASKSYNC_REMOTE_SECRET_KEY`
    /// - `TASKSYNC_REMOTE_TIMEOUT_MS`
    /// - `TASKSYNC_STORE_PATH`
    /// - `TASKSYNC_STORE_MAX_SIZE_MB`
    /// - `TASKSYNC_REMOTE_DELAY_MS`
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TASKSYNC_REMOTE_BASE_URL") {
            self.remote.base_url = url;
        }
        if let Some(bin) = lookup("TASKSYNC_REMOTE_BIN_ID") {
            self.remote.collection_bin = bin;
        }
        if let Some(key) = lookup("TASKSYNC_REMOTE_SECRET_KEY") {
            self.remote.secret_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(ms) = lookup("TASKSYNC_REMOTE_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.remote.request_timeout_ms = ms;
        }
        if let Some(path) = lookup("TASKSYNC_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(mb) = lookup("TASKSYNC_STORE_MAX_SIZE_MB").and_then(|s| s.parse().ok()) {
            self.store.max_size_mb = mb;
        }
        if let Some(ms) = lookup("TASKSYNC_REMOTE_DELAY_MS").and_then(|s| s.parse().ok()) {
            self.sync.remote_delay_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.remote.collection_bin.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.collection_bin",
                reason: "must not be empty".to_string(),
            });
        }
        if self.remote.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remote.request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.store.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.max_size_mb",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
