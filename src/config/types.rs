//! Configuration type definitions

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::execution::DEFAULT_CONTEXT_LINES;
use crate::application::watch::DEBOUNCE_MS;
use crate::domain::policies::WatchMode;

/// Patterns every session ignores unless the config replaces them
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    "vendor/",
    "node_modules/",
    "bin/",
    "build/",
    "dist/",
    "*.swp",
    "*~",
    ".#*",
];

/// Default snapshot location, relative to the watch root
pub const DEFAULT_CACHE_FILE: &str = ".sentinel-cache.json";

/// Engine configuration
///
/// Durations are read and written as milliseconds (`quiet_period_ms`,
/// `test_timeout_ms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Watch root; always supplied by the caller, never read from a file
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(rename = "quiet_period_ms", with = "duration_ms")]
    pub quiet_period: Duration,

    pub max_concurrency: usize,

    pub ignore_patterns: Vec<String>,

    pub context_lines: usize,

    #[serde(
        rename = "test_timeout_ms",
        with = "optional_duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub test_timeout: Option<Duration>,

    pub watch_mode: WatchMode,

    /// Snapshot file; relative paths resolve against `root`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    pub run_on_start: bool,

    pub go_binary: String,

    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            quiet_period: Duration::from_millis(DEBOUNCE_MS),
            max_concurrency: default_concurrency(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            context_lines: DEFAULT_CONTEXT_LINES,
            test_timeout: None,
            watch_mode: WatchMode::default(),
            cache_path: Some(PathBuf::from(DEFAULT_CACHE_FILE)),
            run_on_start: true,
            go_binary: "go".to_string(),
            extra_args: Vec::new(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn with_test_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_watch_mode(mut self, mode: WatchMode) -> Self {
        self.watch_mode = mode;
        self
    }

    pub fn with_cache_path(mut self, path: Option<PathBuf>) -> Self {
        self.cache_path = path;
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn with_go_binary(mut self, binary: impl Into<String>) -> Self {
        self.go_binary = binary.into();
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Absolute snapshot location, if persistence is enabled
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.cache_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.root.join(p)
            }
        })
    }

    /// Configured ignore patterns plus the snapshot file itself
    pub fn effective_ignore_patterns(&self) -> Vec<String> {
        let mut patterns = self.ignore_patterns.clone();
        if let Some(file) = self.cache_file() {
            if let Some(relative) = relative_pattern(&self.root, &file) {
                if !patterns.contains(&relative) {
                    patterns.push(relative);
                }
            }
        }
        patterns
    }
}

fn relative_pattern(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let text = relative.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        None
    } else {
        Some(format!("/{text}"))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// `0` and absence both mean "no timeout"
mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.map(|d| d.as_millis() as u64).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok((ms > 0).then(|| Duration::from_millis(ms)))
    }
}
