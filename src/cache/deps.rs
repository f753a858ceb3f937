//! Resolved dependency records keyed by module
//!
//! Plain key-value store. Eviction is driven entirely by the invalidator.
//! Records are shared, so cloning the cache for a bundler hint or a
//! snapshot never copies module sources.

use crate::cache::module::{DependencyRecord, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mapping from module identity to its dependency record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyCache {
    records: BTreeMap<ModuleId, Arc<DependencyRecord>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under `id`, replacing any previous one
    pub fn put(&mut self, id: ModuleId, record: DependencyRecord) {
        self.records.insert(id, Arc::new(record));
    }

    pub fn get(&self, id: &ModuleId) -> Option<&DependencyRecord> {
        self.records.get(id).map(Arc::as_ref)
    }

    pub fn delete(&mut self, id: &ModuleId) -> Option<Arc<DependencyRecord>> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.records.contains_key(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModuleId> {
        self.records.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &DependencyRecord> {
        self.records.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<DependencyRecord> for DependencyCache {
    fn from_iter<I: IntoIterator<Item = DependencyRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|r| (r.id.clone(), Arc::new(r)))
                .collect(),
        }
    }
}
