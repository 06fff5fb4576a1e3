//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `watcher` - Recursive filesystem watch (notify)
//! - `process/` - `go test -json` command construction
//! - `persistence/` - Cache snapshot on disk
//! - `events/` - Result sinks (NDJSON, console)

pub mod events;
pub mod persistence;
pub mod process;
pub mod watcher;

// Re-export for convenience
pub use events::{ConsoleResultSink, JsonResultSink};
pub use persistence::SnapshotStore;
pub use process::GoTestCommand;
pub use watcher::{ChangeFilter, FsWatcher};
