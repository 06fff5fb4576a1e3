//! Sentinel - incremental watch-mode test engine for Go projects
//!
//! Sentinel watches a Go module, works out which tests a change can affect,
//! reruns only those through `go test -json`, and serves everything else
//! from a fingerprint-validated result cache.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    CancelToken, ChangeAnalyzer, ExecutionScheduler, ResultCache, SchedulerOptions, StopHandle,
    WatchCoordinator,
};
pub use config::EngineConfig;
pub use domain::policies::WatchMode;
pub use domain::ports::{EngineEvent, ResultSink, RunReport, RunTrigger, TestCommand, WatchState};
pub use error::{SentinelError, SentinelResult};
pub use infrastructure::{ConsoleResultSink, FsWatcher, GoTestCommand, JsonResultSink, SnapshotStore};
