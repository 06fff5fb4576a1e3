//! Watch Mode Policy
//!
//! Decides how widely a change fans out into test targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Invalidation granularity applied by the change analyzer
///
/// - `All`: any change reruns every known target
/// - `Package`: a change reruns its whole package (default)
/// - `Related`: a source change reruns only the tests indexed as depending
///   on it, falling back to the whole package when none are known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    All,
    #[default]
    Package,
    Related,
}

impl WatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchMode::All => "all",
            WatchMode::Package => "package",
            WatchMode::Related => "related",
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(WatchMode::All),
            "package" | "changed" => Ok(WatchMode::Package),
            "related" => Ok(WatchMode::Related),
            other => Err(format!(
                "unknown watch mode '{other}' (expected all, package or related)"
            )),
        }
    }
}
