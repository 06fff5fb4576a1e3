//! Configuration module for Sentinel
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (SENTINEL_*)
//! 3. Project config (.sentinel.toml in the watch root)
//! 4. User config (~/.config/sentinel/config.toml)
//! 5. Built-in defaults (lowest priority)
//!
//! The library itself only consumes an explicit [`EngineConfig`]; loading
//! files and environment is left to the binary.

mod loader;
mod types;

pub use loader::{
    load_or_default, load_with_warnings, parse_with_warnings, user_config_path,
    with_env_overrides, with_overrides_from, ConfigWarning, PROJECT_CONFIG_FILE,
};
pub use types::{EngineConfig, DEFAULT_CACHE_FILE, DEFAULT_IGNORE_PATTERNS};
