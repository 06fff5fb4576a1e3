//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::policies::WatchMode;
use crate::error::{SentinelError, SentinelResult};

use super::types::EngineConfig;

/// Project-level config file, looked up in the watch root
pub const PROJECT_CONFIG_FILE: &str = ".sentinel.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown key '{}' in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{suggestion}'?)")?;
        }
        Ok(())
    }
}

/// Load a config file and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> SentinelResult<(EngineConfig, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;
    parse_with_warnings(&content, path)
}

/// Parse config text; `path` is only used for diagnostics.
pub fn parse_with_warnings(
    content: &str,
    path: &Path,
) -> SentinelResult<(EngineConfig, Vec<ConfigWarning>)> {
    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(content);

    let config: EngineConfig = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| SentinelError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                key: key.clone(),
                file: path.to_path_buf(),
                line: find_line_number(content, &key),
                suggestion: suggest_key(&key),
            }
        })
        .collect();

    Ok((config, warnings))
}

/// Load from the project config, the user config, or defaults, then apply
/// `SENTINEL_*` overrides. The returned config is rooted at `root`.
pub fn load_or_default(root: &Path) -> SentinelResult<(EngineConfig, Vec<ConfigWarning>)> {
    let candidates = [Some(root.join(PROJECT_CONFIG_FILE)), user_config_path()];

    for path in candidates.into_iter().flatten() {
        if path.is_file() {
            tracing::debug!("loading config from {}", path.display());
            let (config, warnings) = load_with_warnings(&path)?;
            return Ok((with_env_overrides(config.with_root(root)), warnings));
        }
    }

    Ok((
        with_env_overrides(EngineConfig::default().with_root(root)),
        Vec::new(),
    ))
}

/// `~/.config/sentinel/config.toml` (platform equivalent)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sentinel").join("config.toml"))
}

/// Apply environment variable overrides (SENTINEL_* prefix)
pub fn with_env_overrides(config: EngineConfig) -> EngineConfig {
    with_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup; unparsable values are ignored.
pub fn with_overrides_from<F>(mut config: EngineConfig, lookup: F) -> EngineConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = parse_var::<u64>(&lookup, "SENTINEL_QUIET_PERIOD_MS") {
        config.quiet_period = Duration::from_millis(ms);
    }

    if let Some(n) = parse_var::<usize>(&lookup, "SENTINEL_MAX_CONCURRENCY") {
        config.max_concurrency = n;
    }

    if let Some(n) = parse_var::<usize>(&lookup, "SENTINEL_CONTEXT_LINES") {
        config.context_lines = n;
    }

    // 0 disables the timeout
    if let Some(ms) = parse_var::<u64>(&lookup, "SENTINEL_TEST_TIMEOUT_MS") {
        config.test_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    if let Some(mode) = parse_var::<WatchMode>(&lookup, "SENTINEL_WATCH_MODE") {
        config.watch_mode = mode;
    }

    // Empty or "off" disables persistence
    if let Some(path) = lookup("SENTINEL_CACHE_PATH") {
        let trimmed = path.trim();
        config.cache_path = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("off") {
            None
        } else {
            Some(PathBuf::from(trimmed))
        };
    }

    if let Some(val) = lookup("SENTINEL_RUN_ON_START") {
        config.run_on_start = val.to_lowercase() != "false" && val != "0";
    }

    if let Some(binary) = lookup("SENTINEL_GO_BINARY").filter(|b| !b.trim().is_empty()) {
        config.go_binary = binary.trim().to_string();
    }

    config
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring {key}={raw}: not a valid value");
            None
        }
    }
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    for (i, line) in content.lines().enumerate() {
        if line.contains(needle) {
            return Some(i + 1);
        }
    }
    None
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "quiet_period_ms",
        "max_concurrency",
        "ignore_patterns",
        "context_lines",
        "test_timeout_ms",
        "watch_mode",
        "cache_path",
        "run_on_start",
        "go_binary",
        "extra_args",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
