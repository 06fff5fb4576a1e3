//! Filesystem watcher
//!
//! Wraps a recursive `notify` watch and turns raw notifications into
//! classified [`FileChange`]s on a crossbeam channel.

use std::path::{Path, PathBuf};

use crossbeam_channel as channel;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::domain::policies::{classify, is_relevant};
use crate::domain::value_objects::{FileChange, IgnorePatterns};
use crate::error::{SentinelError, SentinelResult};

/// Decides which notifications become changes
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    ignore: IgnorePatterns,
}

impl ChangeFilter {
    pub fn new(ignore: IgnorePatterns) -> Self {
        Self { ignore }
    }

    /// Changes carried by one notification
    pub fn changes(&self, event: &Event) -> Vec<FileChange> {
        event
            .paths
            .iter()
            .filter_map(|path| self.change_for(&event.kind, path))
            .collect()
    }

    pub fn change_for(&self, kind: &EventKind, path: &Path) -> Option<FileChange> {
        if !matches!(
            kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return None;
        }
        if path.is_dir() || !is_relevant(path) {
            return None;
        }
        if self.ignore.is_ignored(path, false) {
            tracing::trace!("ignored change: {}", path.display());
            return None;
        }
        Some(FileChange::new(path, classify(path)))
    }
}

/// A running recursive watch; stopped on drop
pub struct FsWatcher {
    root: PathBuf,
    inner: Option<RecommendedWatcher>,
}

impl FsWatcher {
    /// Watch `root` recursively
    ///
    /// The returned receiver disconnects once the watcher is stopped.
    pub fn start(
        root: &Path,
        ignore: IgnorePatterns,
    ) -> SentinelResult<(Self, channel::Receiver<FileChange>)> {
        let setup_error = |message: String| SentinelError::WatchSetup {
            path: root.to_path_buf(),
            message,
        };

        if !root.is_dir() {
            return Err(setup_error("not a directory".to_string()));
        }

        let (tx, rx) = channel::unbounded();
        let filter = ChangeFilter::new(ignore);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in filter.changes(&event) {
                        tracing::trace!("{} change: {}", change.kind, change.path.display());
                        let _ = tx.send(change);
                    }
                }
                Err(e) => {
                    let err = SentinelError::FileEvent(e.to_string());
                    tracing::warn!("{err}");
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| setup_error(e.to_string()))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| setup_error(e.to_string()))?;

        tracing::info!("watching {}", root.display());
        Ok((
            Self {
                root: root.to_path_buf(),
                inner: Some(watcher),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }

    /// Release the OS watch (idempotent)
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.inner.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                tracing::debug!("unwatch {}: {e}", self.root.display());
            }
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
