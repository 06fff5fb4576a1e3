//! JSON cache snapshot
//!
//! Persists the result cache between sessions. A snapshot that cannot be
//! read back is reported and replaced by an empty cache.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::application::analysis::ResultCache;
use crate::domain::entities::CachedResult;
use crate::error::{SentinelError, SentinelResult};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    entries: Vec<CachedResult>,
}

/// Snapshot file on disk
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Read stored entries. A missing file is an empty snapshot.
    pub fn read(&self) -> SentinelResult<Vec<CachedResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| SentinelError::CacheCorruption {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SentinelError::CacheCorruption {
                path: self.path.clone(),
                message: format!(
                    "unsupported version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }

        Ok(snapshot.entries)
    }

    /// Load a cache, falling back to an empty one on any error
    pub fn load(&self) -> ResultCache {
        match self.read() {
            Ok(entries) => {
                tracing::debug!(
                    "loaded {} cached result(s) from {}",
                    entries.len(),
                    self.path.display()
                );
                ResultCache::from_entries(entries)
            }
            Err(e) => {
                tracing::warn!("{e}; starting with an empty cache");
                ResultCache::new()
            }
        }
    }

    /// Write every entry of `cache` atomically under an exclusive lock
    pub fn save(&self, cache: &ResultCache) -> SentinelResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let lock_file = fs::File::create(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let result = self.write_snapshot(&parent, cache);

        let _ = lock_file.unlock();
        result
    }

    fn write_snapshot(&self, parent: &Path, cache: &ResultCache) -> SentinelResult<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: cache.entries(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(
            "saved {} cached result(s) to {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
