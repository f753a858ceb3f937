//! Configuration schema for Rebundle
//!
//! Global configuration lives at `~/.config/rebundle/config.toml`; a project
//! may override it with a `.rebundle.toml`.

use crate::cache::DEFAULT_STAT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Incremental cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persisted cache file (None = `.rebundle-cache.json` in the project)
    pub file: Option<PathBuf>,

    /// Maximum concurrent stat calls while invalidating
    pub stat_concurrency: usize,

    /// Drop timestamps of modules that are no longer cached after each run
    pub prune_timestamps: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: None,
            stat_concurrency: DEFAULT_STAT_CONCURRENCY,
            prune_timestamps: true,
        }
    }
}
