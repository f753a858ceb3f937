//! Staleness detection for cached modules
//!
//! Before each bundle every cached module is stat'ed (concurrently, bounded
//! by the configured fan-out) and compared against its recorded mtime.
//! All stats settle before any cache state is touched, so callers never
//! observe a half-evicted cache.

use crate::cache::deps::DependencyCache;
use crate::cache::module::ModuleId;
use crate::cache::timestamps::{mtime_millis, TimestampStore};
use futures_util::stream::{self, StreamExt};
use tracing::debug;

/// Default number of concurrent stat calls
pub const DEFAULT_STAT_CONCURRENCY: usize = 64;

/// Outcome of one invalidation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Modules evicted from the dependency cache, sorted by id
    pub invalidated: Vec<ModuleId>,

    /// Modules that could not be stat'ed and were left untouched
    pub unreadable: Vec<ModuleId>,

    /// Number of cached modules examined
    pub checked: usize,
}

/// Decides which cached modules must be re-walked
#[derive(Debug, Clone, Copy)]
pub struct Invalidator {
    concurrency: usize,
}

impl Invalidator {
    /// Create an invalidator issuing at most `concurrency` stats at once
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// A module is fresh only if an mtime was recorded and the file has not
    /// been modified since. Equal mtimes count as fresh. A zero mtime on
    /// either side means "unknown" and makes the module stale.
    pub fn is_stale(recorded: Option<u64>, current: u64) -> bool {
        !recorded.is_some_and(|recorded| recorded > 0 && current > 0 && current <= recorded)
    }

    /// Evict stale modules from `deps` and bring `timestamps` up to date
    ///
    /// Every successfully stat'ed module gets its new mtime recorded, stale
    /// or not. Modules whose file cannot be stat'ed are skipped entirely and
    /// left for the bundler to report.
    pub async fn invalidate(
        &self,
        deps: &mut DependencyCache,
        timestamps: &mut TimestampStore,
    ) -> InvalidationReport {
        let candidates: Vec<ModuleId> = deps.keys().cloned().collect();
        let checked = candidates.len();

        let observed: Vec<_> = stream::iter(candidates)
            .map(|id| async move {
                let mtime = mtime_millis(id.as_path()).await;
                (id, mtime)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = InvalidationReport {
            checked,
            ..InvalidationReport::default()
        };

        for (id, mtime) in observed {
            let mtime = match mtime {
                Ok(mtime) => mtime,
                Err(e) => {
                    debug!("Skipping {}: {}", id, e);
                    report.unreadable.push(id);
                    continue;
                }
            };

            if Self::is_stale(timestamps.get(&id), mtime) {
                debug!("Invalidating {}", id);
                deps.delete(&id);
                report.invalidated.push(id.clone());
            }
            timestamps.set(id, mtime);
        }

        report.invalidated.sort();
        report.unreadable.sort();
        report
    }
}

impl Default for Invalidator {
    fn default() -> Self {
        Self::new(DEFAULT_STAT_CONCURRENCY)
    }
}
