//! Nearest enclosing package descriptor per file
//!
//! Packages are assumed immutable for the process lifetime, so entries are
//! only ever added, never invalidated.

use crate::cache::module::PackageDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Mapping from a file path to its package descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageCache {
    packages: BTreeMap<PathBuf, PackageDescriptor>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, file: PathBuf, descriptor: PackageDescriptor) {
        self.packages.insert(file, descriptor);
    }

    pub fn get(&self, file: &Path) -> Option<&PackageDescriptor> {
        self.packages.get(file)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl FromIterator<(PathBuf, PackageDescriptor)> for PackageCache {
    fn from_iter<I: IntoIterator<Item = (PathBuf, PackageDescriptor)>>(iter: I) -> Self {
        Self {
            packages: iter.into_iter().collect(),
        }
    }
}
