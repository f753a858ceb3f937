//! Underlying bundler abstraction
//!
//! The incremental layer never resolves or transforms modules itself. It
//! drives an implementation of [`Bundler`], hands it the surviving cache as
//! hints and listens to the records it reports while producing a bundle.

use crate::cache::{DependencyCache, DependencyRecord, ModuleId, PackageCache, PackageDescriptor};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Bundle bytes as produced by the bundler, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BundlerError>>;

/// Failure raised by the bundler itself (syntax error, unresolved import, ...)
///
/// Passed through the output stream untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BundlerError {
    /// Module the failure was reported for, if any
    pub module: Option<ModuleId>,
    pub message: String,
}

impl BundlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            module: None,
            message: message.into(),
        }
    }

    pub fn in_module(module: impl Into<ModuleId>, message: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            message: message.into(),
        }
    }
}

/// Discovery reported by the bundler while it walks the graph
#[derive(Debug, Clone, PartialEq)]
pub enum BundlerEvent {
    /// A module was resolved (or reused from the cache hint)
    Dependency(DependencyRecord),

    /// The package enclosing `file` was resolved
    Package {
        file: PathBuf,
        descriptor: PackageDescriptor,
    },

    /// A file was read
    File(PathBuf),
}

/// Options for one bundle call
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Previously resolved records the bundler may reuse instead of walking
    pub cache: Option<Arc<DependencyCache>>,

    /// Previously resolved package descriptors
    pub package_cache: Option<Arc<PackageCache>>,

    /// Ask the bundler to report full package metadata per module
    pub include_package_metadata: bool,

    /// Bundler-specific options passed through as-is
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BundleOptions {
    /// Set a bundler-specific option
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Overlay these options on top of `defaults`
    ///
    /// Hints set here win over the defaults' hints and `extra` keys set here
    /// replace the defaults' keys.
    pub fn merged_over(self, defaults: &BundleOptions) -> BundleOptions {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra);

        BundleOptions {
            cache: self.cache.or_else(|| defaults.cache.clone()),
            package_cache: self
                .package_cache
                .or_else(|| defaults.package_cache.clone()),
            include_package_metadata: self.include_package_metadata
                || defaults.include_package_metadata,
            extra,
        }
    }
}

/// Output of a bundle call: the bundle bytes plus the discovery side channel
///
/// Implementations send every [`BundlerEvent`] for a run before the byte
/// stream ends. Events still queued when the stream ends are folded; events
/// sent afterwards are ignored.
pub struct BundleOutput {
    pub bytes: ByteStream,
    pub events: mpsc::UnboundedReceiver<BundlerEvent>,
}

impl BundleOutput {
    pub fn new(bytes: ByteStream, events: mpsc::UnboundedReceiver<BundlerEvent>) -> Self {
        Self { bytes, events }
    }
}

/// One-shot module bundler wrapped by the incremental layer
#[async_trait]
pub trait Bundler: Send + Sync + 'static {
    /// Register an entry file for subsequent bundles
    fn add_entry_file(&self, path: PathBuf);

    /// Produce a bundle
    async fn bundle(&self, options: BundleOptions) -> BundleOutput;
}
