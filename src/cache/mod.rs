//! Incremental rebuild cache
//!
//! Keeps what a bundler learned about each module between runs and decides
//! which of it can be trusted on the next run.
//!
//! # Stores
//!
//! | Store | Key | Invalidated by |
//! |-------|-----|----------------|
//! | Timestamps | module id | never (pruned after runs) |
//! | Dependency cache | module id | newer mtime on disk |
//! | Package cache | file path | never |

pub mod deps;
pub mod invalidator;
pub mod module;
pub mod packages;
pub mod snapshot;
pub mod timestamps;

pub use deps::DependencyCache;
pub use invalidator::{InvalidationReport, Invalidator, DEFAULT_STAT_CONCURRENCY};
pub use module::{DependencyRecord, ModuleId, PackageDescriptor};
pub use packages::PackageCache;
pub use snapshot::CacheSnapshot;
pub use timestamps::{mtime_millis, TimestampStore};
