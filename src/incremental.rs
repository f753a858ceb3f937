//! Incremental bundling on top of a one-shot bundler
//!
//! [`IncrementalBundler`] exposes the same "produce bundle" operation as the
//! wrapped [`Bundler`], but keeps the dependency records, package metadata
//! and file mtimes learned by previous runs. Each run:
//!
//! 1. invalidates cached modules whose file changed (all stats settle first)
//! 2. hands the surviving cache to the bundler as hints
//! 3. folds the records the bundler reports back into the cache
//! 4. on completion reports statistics and a snapshot, and persists it
//!
//! A call made while another run is in flight bypasses the cache entirely.

use crate::bundler::{BundleOptions, BundleOutput, Bundler, BundlerError, BundlerEvent, ByteStream};
use crate::cache::{
    CacheSnapshot, DependencyCache, Invalidator, PackageCache, TimestampStore,
    DEFAULT_STAT_CONCURRENCY,
};
use crate::config::schema::CacheConfig;
use crate::events::{CacheEvent, EventBus, EventReceiver};
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Bundle chunks buffered between the driver task and the caller
const CHUNK_BUFFER: usize = 16;

/// Mutable cache state shared by all runs of one instance
#[derive(Debug, Default)]
struct CacheState {
    deps: DependencyCache,
    timestamps: TimestampStore,
    packages: PackageCache,
    /// No cache existed yet: the next run does a full walk without hints
    cold: bool,
}

/// Per-instance settings every run needs
#[derive(Debug)]
struct RunSettings {
    cache_file: Option<PathBuf>,
    invalidator: Invalidator,
    prune_timestamps: bool,
}

/// Clears the in-flight flag when the run ends, however it ends
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for [`IncrementalBundler`]
pub struct IncrementalBundlerBuilder<B: Bundler> {
    bundler: B,
    cache_file: Option<PathBuf>,
    seed: Option<CacheSnapshot>,
    package_cache: Option<PackageCache>,
    defaults: BundleOptions,
    stat_concurrency: usize,
    prune_timestamps: bool,
    events: EventBus,
}

impl<B: Bundler> IncrementalBundlerBuilder<B> {
    fn new(bundler: B) -> Self {
        Self {
            bundler,
            cache_file: None,
            seed: None,
            package_cache: None,
            defaults: BundleOptions::default(),
            stat_concurrency: DEFAULT_STAT_CONCURRENCY,
            prune_timestamps: true,
            events: EventBus::new(),
        }
    }

    /// Read the cache from `path` at build time and write it back after
    /// every run
    pub fn cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Start from an in-memory snapshot; overrides the cache file contents
    pub fn seed(mut self, snapshot: CacheSnapshot) -> Self {
        self.seed = Some(snapshot);
        self
    }

    /// Start from known package descriptors
    pub fn package_cache(mut self, packages: PackageCache) -> Self {
        self.package_cache = Some(packages);
        self
    }

    /// Options every bundle call is merged over
    pub fn defaults(mut self, options: BundleOptions) -> Self {
        self.defaults = options;
        self
    }

    /// Bound on concurrent stats during invalidation
    pub fn stat_concurrency(mut self, concurrency: usize) -> Self {
        self.stat_concurrency = concurrency;
        self
    }

    /// Drop timestamps of modules no longer cached after each run
    pub fn prune_timestamps(mut self, prune: bool) -> Self {
        self.prune_timestamps = prune;
        self
    }

    /// Apply the `[cache]` section of the configuration
    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        if let Some(ref file) = config.file {
            self.cache_file = Some(file.clone());
        }
        self.stat_concurrency = config.stat_concurrency;
        self.prune_timestamps = config.prune_timestamps;
        self
    }

    /// Subscribe before building so cache-file read errors are observed
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Build the incremental bundler
    ///
    /// Never fails: an unreadable or malformed cache file is reported as
    /// [`CacheEvent::CacheFileReadError`] and the instance starts cold.
    pub async fn build(self) -> IncrementalBundler<B> {
        let mut state = CacheState {
            cold: true,
            ..CacheState::default()
        };

        if let Some(ref path) = self.cache_file {
            match CacheSnapshot::load(path).await {
                Ok(snapshot) => {
                    info!(
                        "Loaded {} cached modules from {}",
                        snapshot.dependency_cache.len(),
                        path.display()
                    );
                    state.deps = snapshot.dependency_cache;
                    state.timestamps = snapshot.timestamps;
                    state.cold = false;
                }
                Err(e) => {
                    if e.is_cold_start() {
                        debug!("Starting without cache: {}", e);
                    } else {
                        warn!("Ignoring cache file: {}", e);
                    }
                    self.events.emit(CacheEvent::CacheFileReadError {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Some(seed) = self.seed {
            state.deps = seed.dependency_cache;
            state.timestamps = seed.timestamps;
            state.cold = false;
        }

        if let Some(packages) = self.package_cache {
            state.packages = packages;
        }

        IncrementalBundler {
            bundler: Arc::new(self.bundler),
            state: Arc::new(Mutex::new(state)),
            in_flight: Arc::new(AtomicBool::new(false)),
            defaults: self.defaults,
            settings: Arc::new(RunSettings {
                cache_file: self.cache_file,
                invalidator: Invalidator::new(self.stat_concurrency),
                prune_timestamps: self.prune_timestamps,
            }),
            events: self.events,
        }
    }
}

/// Cache-backed wrapper around a one-shot [`Bundler`]
pub struct IncrementalBundler<B: Bundler> {
    bundler: Arc<B>,
    state: Arc<Mutex<CacheState>>,
    in_flight: Arc<AtomicBool>,
    defaults: BundleOptions,
    settings: Arc<RunSettings>,
    events: EventBus,
}

impl<B: Bundler> IncrementalBundler<B> {
    /// Start building an incremental bundler around `bundler`
    pub fn builder(bundler: B) -> IncrementalBundlerBuilder<B> {
        IncrementalBundlerBuilder::new(bundler)
    }

    /// Register an entry file with the underlying bundler
    pub fn add_entry_file(&self, path: impl Into<PathBuf>) {
        self.bundler.add_entry_file(path.into());
    }

    /// Listen to events emitted from now on
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The wrapped bundler
    pub fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Configured cache file, if any
    pub fn cache_file(&self) -> Option<&Path> {
        self.settings.cache_file.as_deref()
    }

    /// Whether a cache-mediated run is in flight
    pub fn is_bundling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Copy of the current dependency cache and timestamps
    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.lock().await;
        CacheSnapshot::new(state.deps.clone(), state.timestamps.clone())
    }

    /// Copy of the current package-metadata cache
    pub async fn package_cache(&self) -> PackageCache {
        self.state.lock().await.packages.clone()
    }

    /// Produce a bundle
    ///
    /// The returned stream yields the bundler's chunks and errors unchanged.
    /// It ends only after the run's records are folded into the cache and
    /// the completion events are emitted.
    pub async fn bundle(&self, options: BundleOptions) -> ByteStream {
        let options = options.merged_over(&self.defaults);

        let Some(in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!("Bundle already in flight, delegating without cache");
            return self.bundler.bundle(options).await.bytes;
        };

        let start = Instant::now();
        let options = self.prepare(options).await;
        let output = self.bundler.bundle(options).await;

        let run = Run {
            state: Arc::clone(&self.state),
            settings: Arc::clone(&self.settings),
            events: self.events.clone(),
            start,
        };
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        tokio::spawn(run.drive(output, tx, in_flight));

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        })
        .boxed()
    }

    /// Invalidate stale modules and inject the surviving cache as hints
    async fn prepare(&self, mut options: BundleOptions) -> BundleOptions {
        let mut state = self.state.lock().await;
        let CacheState {
            deps, timestamps, ..
        } = &mut *state;

        let report = self.settings.invalidator.invalidate(deps, timestamps).await;
        if !report.invalidated.is_empty() {
            info!("Invalidated {} of {} modules", report.invalidated.len(), report.checked);
        }
        self.events.emit(CacheEvent::Update(report.invalidated));

        if !state.cold {
            options.cache = Some(Arc::new(state.deps.clone()));
        }
        options.package_cache = Some(Arc::new(state.packages.clone()));
        options.include_package_metadata = true;
        options
    }
}

/// One cache-mediated run, driven on its own task
struct Run {
    state: Arc<Mutex<CacheState>>,
    settings: Arc<RunSettings>,
    events: EventBus,
    start: Instant,
}

impl Run {
    async fn drive(
        self,
        mut output: BundleOutput,
        tx: mpsc::Sender<Result<Vec<u8>, BundlerError>>,
        in_flight: InFlight,
    ) {
        let mut bytes: u64 = 0;
        let mut events_done = false;

        loop {
            tokio::select! {
                biased;
                event = output.events.recv(), if !events_done => {
                    match event {
                        Some(event) => self.fold(event).await,
                        None => events_done = true,
                    }
                }
                chunk = output.bytes.next() => {
                    match chunk {
                        Some(chunk) => {
                            if let Ok(ref buf) = chunk {
                                bytes += buf.len() as u64;
                            }
                            // Keep folding even if the caller stopped reading
                            let _ = tx.send(chunk).await;
                        }
                        None => break,
                    }
                }
            }
        }

        while let Ok(event) = output.events.try_recv() {
            self.fold(event).await;
        }

        self.finish(bytes).await;
        drop(in_flight);
        drop(tx);
    }

    async fn fold(&self, event: BundlerEvent) {
        let mut state = self.state.lock().await;
        match event {
            BundlerEvent::Dependency(record) => {
                let id = record.id.clone();
                state.deps.put(id.clone(), record);
                if !matches!(state.timestamps.get(&id), Some(mtime) if mtime > 0) {
                    state.timestamps.refresh(&id).await;
                }
            }
            BundlerEvent::Package { file, descriptor } => {
                state.packages.put(file, descriptor);
            }
            BundlerEvent::File(path) => {
                debug!("Visited {}", path.display());
            }
        }
    }

    async fn finish(&self, bytes: u64) {
        let elapsed = self.start.elapsed();

        let snapshot = {
            let mut state = self.state.lock().await;
            state.cold = false;

            if self.settings.prune_timestamps {
                let CacheState {
                    deps, timestamps, ..
                } = &mut *state;
                let pruned = timestamps.retain(|id| deps.contains(id));
                if pruned > 0 {
                    debug!("Pruned {} timestamps of uncached modules", pruned);
                }
            }

            Arc::new(CacheSnapshot::new(
                state.deps.clone(),
                state.timestamps.clone(),
            ))
        };

        let message = format!(
            "{} bytes written ({:.2} seconds)",
            bytes,
            elapsed.as_secs_f64()
        );
        info!("{}", message);
        self.events.emit(CacheEvent::Log(message));
        self.events.emit(CacheEvent::Time(elapsed.as_millis() as u64));
        self.events.emit(CacheEvent::Bytes(bytes));
        self.events.emit(CacheEvent::Snapshot(Arc::clone(&snapshot)));

        if let Some(ref path) = self.settings.cache_file {
            match snapshot.save(path).await {
                Ok(()) => {
                    debug!("Cache written to {}", path.display());
                    self.events.emit(CacheEvent::CacheFileWritten(path.clone()));
                }
                Err(e) => {
                    warn!("Failed to write cache: {}", e);
                    self.events.emit(CacheEvent::CacheFileWriteError {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
