//! Result Sink Port
//!
//! Receives everything the engine publishes: state transitions, one report
//! per run, and non-fatal errors. Display layers implement this trait.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::domain::entities::ExecutionResult;

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    Watching,
    Debouncing,
    Executing,
    Publishing,
}

impl WatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchState::Idle => "idle",
            WatchState::Watching => "watching",
            WatchState::Debouncing => "debouncing",
            WatchState::Executing => "executing",
            WatchState::Publishing => "publishing",
        }
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// What caused a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTrigger {
    /// First run after the coordinator started
    Startup,
    /// Explicit request for a full run
    Manual,
    /// A settled batch of file changes
    Changes(Vec<PathBuf>),
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Startup => "startup",
            RunTrigger::Manual => "manual",
            RunTrigger::Changes(_) => "changes",
        }
    }
}

/// Everything published about one finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub trigger: RunTrigger,
    pub result: ExecutionResult,
    pub stats: CacheStats,
}

/// Event published by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Watching began
    Started { root: PathBuf },
    /// The coordinator moved to a new state
    StateChanged { from: WatchState, to: WatchState },
    /// A run finished; the report is moved to the sink
    RunCompleted(RunReport),
    /// A non-fatal problem worth surfacing
    Error { message: String },
    /// The coordinator stopped
    Stopped,
}

/// Trait for receiving engine events
pub trait ResultSink: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// No-op sink for silent operation
pub struct NoopResultSink;

impl ResultSink for NoopResultSink {
    fn on_event(&self, _event: EngineEvent) {}
}

/// Sink that keeps every event, for tests and embedding
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<RunReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::RunCompleted(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<WatchState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl ResultSink for CollectingSink {
    fn on_event(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
