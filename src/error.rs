//! Error types for Sentinel
//!
//! Uses `thiserror` for library errors. Session-level failures (`WatchSetup`)
//! abort the watch; everything scoped to a single file or target is reported
//! inline and never stops the loop.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Sentinel operations
pub type SentinelResult<T> = Result<T, SentinelError>;

/// Main error type for Sentinel operations
#[derive(Error, Debug)]
pub enum SentinelError {
    /// The initial watch could not be established (fatal)
    #[error("cannot watch {path}: {message}")]
    WatchSetup { path: PathBuf, message: String },

    /// A single filesystem notification failed (logged and skipped)
    #[error("file event error: {0}")]
    FileEvent(String),

    /// A line of the test event stream could not be decoded
    #[error("malformed test event on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A target failed to build or could not be started
    #[error("build failed for {package}: {message}")]
    BuildFailure { package: String, message: String },

    /// A test subprocess exceeded its deadline and was killed
    #[error("{package} timed out after {}ms", after.as_millis())]
    Timeout { package: String, after: Duration },

    /// The on-disk cache snapshot is unreadable
    #[error("cache snapshot {path} is unusable: {message}")]
    CacheCorruption { path: PathBuf, message: String },

    /// Invalid configuration file
    #[error("invalid configuration in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SentinelError {
    /// Whether this error must abort the whole watch session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SentinelError::WatchSetup { .. })
    }
}
