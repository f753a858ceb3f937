//! Observable notifications emitted by the incremental layer
//!
//! Everything the cache layer itself can fail at is reported here rather
//! than returned as an error.

use crate::cache::{CacheSnapshot, ModuleId};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Notification emitted by [`crate::IncrementalBundler`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Human-readable summary line
    Log(String),

    /// Modules invalidated before a run (may be empty)
    Update(Vec<ModuleId>),

    /// Elapsed time of a run in milliseconds
    Time(u64),

    /// Bundle size of a run in bytes
    Bytes(u64),

    /// Cache state at the end of a run
    Snapshot(Arc<CacheSnapshot>),

    /// The persisted cache could not be used; starting cold
    CacheFileReadError { path: PathBuf, reason: String },

    /// The snapshot could not be persisted
    CacheFileWriteError { path: PathBuf, reason: String },

    /// The snapshot was persisted
    CacheFileWritten(PathBuf),
}

impl CacheEvent {
    /// Short name of the event kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Update(_) => "update",
            Self::Time(_) => "time",
            Self::Bytes(_) => "bytes",
            Self::Snapshot(_) => "cache",
            Self::CacheFileReadError { .. } => "cache-file-read-error",
            Self::CacheFileWriteError { .. } => "cache-file-write-error",
            Self::CacheFileWritten(_) => "cache-file-written",
        }
    }
}

/// Receiving end of a subscription
pub type EventReceiver = mpsc::UnboundedReceiver<CacheEvent>;

/// Registry of event listeners
///
/// Listeners whose receiver was dropped are forgotten on the next emit.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<CacheEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live listener
    pub fn emit(&self, event: CacheEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<CacheEvent>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
