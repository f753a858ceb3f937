//! Module identities and the records cached for them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of a module in the dependency graph
///
/// In practice an absolute file path or a resolved module key. The
/// invalidator stats the id as a path, so ids that are not paths are
/// simply never invalidated by file changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a module id from any string-like key
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Module id for a file on disk
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    /// The id as a filesystem path
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<PathBuf> for ModuleId {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

/// Metadata of the package enclosing a file
///
/// Only `name`, `version` and `dir` are interpreted; every other field of
/// the descriptor the bundler reported is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Directory holding the package manifest
    #[serde(default, rename = "__dirname", skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageDescriptor {
    /// Create a descriptor for a named package
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Set the package directory
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// Result of the bundler's graph walk for one module
///
/// Produced once per module per successful walk and only ever replaced
/// wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub id: ModuleId,

    /// Resolved path of the module file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Transformed source text
    pub source: String,

    /// Requested name mapped to the resolved module
    #[serde(default)]
    pub deps: BTreeMap<String, ModuleId>,

    /// Whether the module is a bundle entry point
    #[serde(default)]
    pub entry: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageDescriptor>,
}

impl DependencyRecord {
    /// Create a record with no dependencies
    pub fn new(id: impl Into<ModuleId>, source: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            file: Some(id.as_path().to_path_buf()),
            id,
            source: source.into(),
            deps: BTreeMap::new(),
            entry: false,
            package: None,
        }
    }

    /// Add a resolved dependency
    pub fn with_dep(mut self, request: impl Into<String>, resolved: impl Into<ModuleId>) -> Self {
        self.deps.insert(request.into(), resolved.into());
        self
    }

    /// Mark the record as an entry point
    pub fn as_entry(mut self) -> Self {
        self.entry = true;
        self
    }
}
