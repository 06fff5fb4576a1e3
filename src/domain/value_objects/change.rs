//! File change value objects

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// What kind of file changed, decided from the path alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A `_test.go` file
    Test,
    /// Any other file inside a package
    Source,
    /// Lint/build/tool configuration
    Config,
    /// Module manifest or checksum file
    Dependency,
}

impl ChangeKind {
    /// Config and dependency changes may alter the build of every package.
    pub fn is_global(self) -> bool {
        matches!(self, ChangeKind::Config | ChangeKind::Dependency)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Test => "test",
            ChangeKind::Source => "source",
            ChangeKind::Config => "config",
            ChangeKind::Dependency => "dependency",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified change observed by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: Instant,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at: Instant::now(),
        }
    }

    /// Directory of the package containing the changed file
    pub fn package_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// A settled group of changes flushed by the debouncer
///
/// Paths are unique and ordered by first arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub changes: Vec<FileChange>,
}

impl Batch {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.iter().map(|c| c.path.as_path())
    }

    /// Whether any change forces a full invalidation
    pub fn has_global_change(&self) -> bool {
        self.changes.iter().any(|c| c.kind.is_global())
    }

    /// Append another batch, keeping paths unique (later kind wins)
    pub fn absorb(&mut self, other: Batch) {
        for change in other.changes {
            match self.changes.iter_mut().find(|c| c.path == change.path) {
                Some(existing) => *existing = change,
                None => self.changes.push(change),
            }
        }
    }
}
