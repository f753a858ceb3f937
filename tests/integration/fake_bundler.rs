//! Minimal bundler walking `require("./name");` lines between `.js` files

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rebundle::{BundleOptions, BundleOutput, Bundler, BundlerError, BundlerEvent, DependencyRecord, ModuleId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct RequireBundler {
    entries: Mutex<Vec<PathBuf>>,
    reads: AtomicUsize,
}

impl RequireBundler {
    /// Number of module files read from disk so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn requests(source: &str) -> Vec<String> {
        source
            .lines()
            .filter_map(|line| {
                line.trim()
                    .strip_prefix("require(\"")
                    .and_then(|rest| rest.strip_suffix("\");"))
                    .map(str::to_string)
            })
            .collect()
    }

    fn resolve(from: &Path, request: &str) -> PathBuf {
        let dir = from.parent().unwrap_or(Path::new("."));
        dir.join(format!("{}.js", request.trim_start_matches("./")))
    }

    fn walk(&self, path: &Path) -> Result<DependencyRecord, BundlerError> {
        let id = ModuleId::from_path(path);
        let source = std::fs::read_to_string(path)
            .map_err(|e| BundlerError::in_module(id.clone(), format!("Cannot read module: {e}")))?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut record = DependencyRecord::new(id, source.clone());
        for request in Self::requests(&source) {
            let resolved = Self::resolve(path, &request);
            record = record.with_dep(request, ModuleId::from_path(resolved));
        }
        Ok(record)
    }
}

#[async_trait]
impl Bundler for RequireBundler {
    fn add_entry_file(&self, path: PathBuf) {
        self.entries.lock().unwrap().push(path);
    }

    async fn bundle(&self, options: BundleOptions) -> BundleOutput {
        let (tx, rx) = mpsc::unbounded_channel();
        let entries: Vec<ModuleId> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(ModuleId::from_path)
            .collect();

        let mut pending = entries.clone();
        let mut seen = BTreeSet::new();
        let mut modules = BTreeMap::new();
        let mut errors = Vec::new();

        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }

            let cached = options.cache.as_ref().and_then(|cache| cache.get(&id)).cloned();
            let record = match cached {
                Some(record) => record,
                None => match self.walk(id.as_path()) {
                    Ok(record) => {
                        let _ = tx.send(BundlerEvent::File(id.as_path().to_path_buf()));
                        record
                    }
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
            };

            let mut record = record;
            record.entry = entries.contains(&id);
            pending.extend(record.deps.values().cloned());
            let _ = tx.send(BundlerEvent::Dependency(record.clone()));
            modules.insert(id, record);
        }

        let mut chunks: Vec<Result<Vec<u8>, BundlerError>> = modules
            .values()
            .map(|record| Ok(format!("// {}\n{}", record.id, record.source).into_bytes()))
            .collect();
        chunks.extend(errors.into_iter().map(Err));

        BundleOutput::new(stream::iter(chunks).boxed(), rx)
    }
}
