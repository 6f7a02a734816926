//! OrgAudit configuration loading from `.orgauditrc.toml`.
//!
//! Configuration is optional. Missing sections, a missing file or a file that
//! fails to parse all fall back to defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! directory = ".orgaudit/cache"
//! max_size_kb = 5120
//! compression = "zstd"
//!
//! [output]
//! format = "table"
//! color = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".orgauditrc.toml";

/// Default cache directory relative to the working directory.
const DEFAULT_CACHE_DIR: &str = ".orgaudit/cache";

/// Store file inside the cache directory.
const CACHE_STORE_FILE: &str = "store.json";

/// Root configuration structure loaded from `.orgauditrc.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct OrgAuditConfig {
    /// Dataset cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Output formatting preferences.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Payload codec for cache entries.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionSetting {
    #[default]
    Zstd,
    None,
}

/// Dataset cache configuration.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// When `false`, every run fetches and nothing is persisted.
    ///
    /// Default: `true`
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Directory holding the cache store.
    ///
    /// Defaults to `.orgaudit/cache`.
    #[serde(default)]
    pub directory: Option<String>,

    /// Capacity of the cache store, in kilobytes. Writes beyond it are
    /// dropped with a warning.
    #[serde(default)]
    pub max_size_kb: Option<usize>,

    #[serde(default)]
    pub compression: CompressionSetting,
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            max_size_kb: None,
            compression: CompressionSetting::default(),
        }
    }
}

/// Output formatting preferences. Command-line flags take precedence.
#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    /// Default output format: `table` or `json`.
    #[serde(default)]
    pub format: Option<String>,

    /// Force colored output on or off. Unset means auto-detect.
    #[serde(default)]
    pub color: Option<bool>,
}

impl OrgAuditConfig {
    /// Load configuration from `.orgauditrc.toml` in `root`.
    ///
    /// Parse errors are logged as warnings and defaults are used.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", CONFIG_FILE, e);
                }
            }
        }
        Self::default()
    }

    pub fn default_format(&self) -> Option<&str> {
        self.output.format.as_deref()
    }

    pub fn use_color(&self) -> Option<bool> {
        self.output.color
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.enabled
    }

    /// Path of the cache store file under `root`.
    pub fn cache_store_path(&self, root: &Path) -> PathBuf {
        root.join(self.cache.directory.as_deref().unwrap_or(DEFAULT_CACHE_DIR))
            .join(CACHE_STORE_FILE)
    }

    /// Store capacity in bytes, if configured.
    pub fn cache_capacity_bytes(&self) -> Option<usize> {
        self.cache.max_size_kb.map(|kb| kb * 1024)
    }
}
