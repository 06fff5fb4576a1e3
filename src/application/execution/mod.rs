//! Test Execution
//!
//! - `ExecutionScheduler` - bounded worker pool running one subprocess per target
//! - `StreamProcessor` - incremental decoder for the `go test -json` stream

mod scheduler;
mod stream;


pub use scheduler::{ExecutionScheduler, SchedulerOptions, KILL_GRACE};
pub use stream::{read_context, Interruption, StreamProcessor, DEFAULT_CONTEXT_LINES};
