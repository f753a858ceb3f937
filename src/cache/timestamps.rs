//! Last-observed modification times per module

use crate::cache::module::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Query a file's modification time in milliseconds since the Unix epoch
pub async fn mtime_millis(path: &Path) -> io::Result<u64> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_millis() as u64)
}

/// Mapping from module identity to last-observed mtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampStore {
    mtimes: BTreeMap<ModuleId, u64>,
}

impl TimestampStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ModuleId) -> Option<u64> {
        self.mtimes.get(id).copied()
    }

    pub fn set(&mut self, id: ModuleId, mtime_ms: u64) {
        self.mtimes.insert(id, mtime_ms);
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.mtimes.contains_key(id)
    }

    pub fn remove(&mut self, id: &ModuleId) -> Option<u64> {
        self.mtimes.remove(id)
    }

    /// Re-read the on-disk mtime of `id` and store it
    ///
    /// Best effort: if the file cannot be stat'ed the previous value is kept
    /// and `None` is returned.
    pub async fn refresh(&mut self, id: &ModuleId) -> Option<u64> {
        match mtime_millis(id.as_path()).await {
            Ok(mtime) => {
                self.mtimes.insert(id.clone(), mtime);
                Some(mtime)
            }
            Err(e) => {
                debug!("Could not refresh mtime of {}: {}", id, e);
                None
            }
        }
    }

    /// Keep only entries for which `keep` returns true, returning how many
    /// were dropped
    pub fn retain(&mut self, mut keep: impl FnMut(&ModuleId) -> bool) -> usize {
        let before = self.mtimes.len();
        self.mtimes.retain(|id, _| keep(id));
        before - self.mtimes.len()
    }

    pub fn len(&self) -> usize {
        self.mtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mtimes.is_empty()
    }
}
