//! Configuration loading and management
//!
//! Handles parsing of `.tally.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file at the workspace root
pub const CONFIG_FILE: &str = ".tally.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Statistics configuration
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the JSON documents, relative to the workspace root
    #[serde(default = "default_store_dir")]
    pub dir: String,

    /// How long writers wait for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_dir() -> String {
    ".tally".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Number of entries shown by `tally stats` when `--top` is omitted
    #[serde(default = "default_top_resources")]
    pub top_resources: usize,
}

fn default_top_resources() -> usize {
    5
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_resources: default_top_resources(),
        }
    }
}

impl Config {
    /// Load configuration from a `.tally.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the workspace root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Absolute path of the store directory for a workspace root
    pub fn store_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.store.dir)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.store.dir.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "store.dir cannot be empty".to_string(),
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.stats.top_resources == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "stats.top_resources must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
