//! Rebundle - incremental rebuild cache for module bundlers
//!
//! Persists per-module dependency records and file modification times
//! between bundle runs and invalidates only the modules whose file changed,
//! so repeated bundles (e.g. in a watch loop) become cheap deltas.

pub mod bundler;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod incremental;

pub use bundler::{BundleOptions, BundleOutput, Bundler, BundlerError, BundlerEvent, ByteStream};
pub use cache::{CacheSnapshot, DependencyRecord, ModuleId, PackageDescriptor};
pub use error::{RebundleError, RebundleResult};
pub use events::{CacheEvent, EventReceiver};
pub use incremental::{IncrementalBundler, IncrementalBundlerBuilder};
