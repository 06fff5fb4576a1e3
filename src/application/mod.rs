//! Application Layer
//!
//! Orchestrates the engine on top of the domain layer.
//! This layer:
//! - Depends on Domain layer (entities, policies, ports)
//! - Does NOT contain business rules (those are in Domain)
//! - Coordinates between Infrastructure and Domain
//!
//! ## Components
//!
//! - `analysis` - Test discovery, change analysis and the result cache
//! - `execution` - Stream decoding and the subprocess scheduler
//! - `watch` - Debouncing, test cycles and the watch coordinator
//! - `CancelToken` - Cooperative cancellation shared by all of the above

pub mod analysis;
mod cancel;
pub mod execution;
pub mod watch;

pub use analysis::{ChangeAnalyzer, ResultCache, StaleSet};
pub use cancel::CancelToken;
pub use execution::{ExecutionScheduler, SchedulerOptions, StreamProcessor};
pub use watch::{Debouncer, StopHandle, TestCycle, WatchCoordinator};
