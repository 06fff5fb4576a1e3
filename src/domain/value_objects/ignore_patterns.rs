//! Ignore patterns value object
//!
//! Decides which paths under the watch root never produce change events,
//! using gitignore semantics. Patterns come from configuration plus an
//! optional `.sentinelignore` file at the root.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional per-project ignore file
pub const IGNORE_FILE: &str = ".sentinelignore";

/// Maximum file size for `.sentinelignore` (64KB)
const MAX_FILE_SIZE: u64 = 65536;

/// Maximum number of patterns allowed
const MAX_PATTERNS: usize = 1000;

/// Compiled ignore patterns anchored at the watch root.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    root: PathBuf,
    matcher: Gitignore,
    pattern_count: usize,
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        Self::empty()
    }
}

impl IgnorePatterns {
    /// Create an empty pattern set (matches nothing).
    pub fn empty() -> Self {
        Self {
            root: PathBuf::new(),
            matcher: Gitignore::empty(),
            pattern_count: 0,
        }
    }

    /// Build patterns for `root` from configured patterns plus `.sentinelignore`.
    ///
    /// A missing `.sentinelignore` is fine; an oversized or invalid one is an error.
    pub fn load(root: &Path, configured: &[String]) -> Result<Self, IgnoreError> {
        let ignore_path = root.join(IGNORE_FILE);
        let mut lines: Vec<(PathBuf, String)> = configured
            .iter()
            .map(|p| (PathBuf::from("<config>"), p.clone()))
            .collect();

        if ignore_path.exists() {
            let metadata = fs::metadata(&ignore_path)?;
            if metadata.len() > MAX_FILE_SIZE {
                return Err(IgnoreError::FileTooLarge {
                    path: ignore_path,
                    size: metadata.len(),
                    limit: MAX_FILE_SIZE,
                });
            }
            let content = fs::read_to_string(&ignore_path)?;
            lines.extend(
                content
                    .lines()
                    .map(|line| (ignore_path.clone(), line.to_string())),
            );
        }

        Self::from_lines(root, lines)
    }

    /// Build patterns for `root` from an explicit list (no file lookup).
    pub fn from_patterns(root: &Path, patterns: &[&str]) -> Result<Self, IgnoreError> {
        Self::from_lines(
            root,
            patterns
                .iter()
                .map(|p| (PathBuf::from("<inline>"), p.to_string())),
        )
    }

    fn from_lines<I>(root: &Path, lines: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = (PathBuf, String)>,
    {
        let mut builder = GitignoreBuilder::new(root);
        let mut pattern_count = 0;

        for (line_num, (source, line)) in lines.into_iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            pattern_count += 1;
            if pattern_count > MAX_PATTERNS {
                return Err(IgnoreError::TooManyPatterns {
                    count: pattern_count,
                    limit: MAX_PATTERNS,
                });
            }

            if let Err(e) = builder.add_line(Some(source.clone()), trimmed) {
                return Err(IgnoreError::InvalidPattern {
                    source_file: source,
                    line: line_num + 1,
                    pattern: trimmed.to_string(),
                    message: e.to_string(),
                });
            }
        }

        let matcher = builder
            .build()
            .map_err(|e| IgnoreError::BuildFailed(e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            matcher,
            pattern_count,
        })
    }

    /// Check if a path should be ignored.
    ///
    /// Accepts paths relative to the root or absolute paths under it; an
    /// absolute path outside the root is never ignored.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.pattern_count == 0 {
            return false;
        }
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        } else {
            path
        };
        if rel.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(rel, is_dir)
            .is_ignore()
    }

    /// Get the number of patterns loaded.
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// Check if this is an empty pattern set.
    pub fn is_empty(&self) -> bool {
        self.pattern_count == 0
    }
}

/// Errors that can occur when building ignore patterns.
#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error(".sentinelignore exceeds {}KB limit ({size} bytes): {}", limit / 1024, path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{count} ignore patterns exceed the {limit} limit")]
    TooManyPatterns { count: usize, limit: usize },

    #[error("invalid ignore pattern at {}:{line}: '{pattern}' - {message}", source_file.display())]
    InvalidPattern {
        source_file: PathBuf,
        line: usize,
        pattern: String,
        message: String,
    },

    #[error("failed to build ignore matcher: {0}")]
    BuildFailed(String),

    #[error("IO error reading .sentinelignore: {0}")]
    Io(#[from] std::io::Error),
}
