//! Persistable cache snapshot
//!
//! The on-disk form is a JSON object with two maps: `cache` (dependency
//! records keyed by module id) and `mtimes` (millisecond mtimes keyed by
//! module id).

use crate::cache::deps::DependencyCache;
use crate::cache::timestamps::TimestampStore;
use crate::error::{RebundleError, RebundleResult};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Dependency cache plus timestamps at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(rename = "cache")]
    pub dependency_cache: DependencyCache,

    #[serde(rename = "mtimes")]
    pub timestamps: TimestampStore,
}

impl CacheSnapshot {
    pub fn new(dependency_cache: DependencyCache, timestamps: TimestampStore) -> Self {
        Self {
            dependency_cache,
            timestamps,
        }
    }

    /// Parse a snapshot from its JSON form
    pub fn from_json(path: &Path, content: &str) -> RebundleResult<Self> {
        serde_json::from_str(content).map_err(|e| RebundleError::CacheFileCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load a snapshot from a cache file
    pub async fn load(path: &Path) -> RebundleResult<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RebundleError::CacheFileNotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(RebundleError::io(
                    format!("reading cache file {}", path.display()),
                    e,
                ))
            }
        };

        let snapshot = Self::from_json(path, &content)?;
        debug!(
            "Loaded cache file {} with {} modules",
            path.display(),
            snapshot.dependency_cache.len()
        );
        Ok(snapshot)
    }

    /// Write the snapshot to a cache file, creating parent directories
    pub async fn save(&self, path: &Path) -> RebundleResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RebundleError::CacheFileWrite {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        let content = serde_json::to_string(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| RebundleError::CacheFileWrite {
                path: path.to_path_buf(),
                source: e,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.dependency_cache.is_empty() && self.timestamps.is_empty()
    }
}
