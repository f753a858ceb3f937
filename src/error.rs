//! Error types for Rebundle
//!
//! All modules use `RebundleResult<T>` as their return type. Failures of the
//! wrapped bundler are not represented here; they travel through the output
//! stream as [`crate::bundler::BundlerError`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Rebundle operations
pub type RebundleResult<T> = Result<T, RebundleError>;

/// All errors that can occur in Rebundle
#[derive(Error, Debug)]
pub enum RebundleError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache file errors
    #[error("Cache file not found: {0}")]
    CacheFileNotFound(PathBuf),

    #[error("Corrupted cache file {path}: {reason}")]
    CacheFileCorrupt { path: PathBuf, reason: String },

    #[error("Failed to write cache file {path}: {source}")]
    CacheFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl RebundleError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error only means "start from an empty cache"
    pub fn is_cold_start(&self) -> bool {
        matches!(
            self,
            Self::CacheFileNotFound(_) | Self::CacheFileCorrupt { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheFileNotFound(_) => Some("Run a bundle first to create the cache file"),
            Self::CacheFileCorrupt { .. } => Some("Run: rebundle cache clear"),
            Self::ConfigInvalid { .. } => Some("Run: rebundle config show"),
            _ => None,
        }
    }
}
