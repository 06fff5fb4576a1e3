//! Watch loop
//!
//! - `Debouncer` - Coalesces raw changes into settled per-package batches
//! - `TestCycle` - Analyze, invalidate, serve from cache, execute, store
//! - `WatchCoordinator` - State machine tying watcher, debouncer and cycles together

mod coordinator;
mod cycle;
mod debouncer;


pub use coordinator::{StopHandle, WatchCoordinator};
pub use cycle::TestCycle;
pub use debouncer::{DebounceState, Debouncer, DEBOUNCE_MS};
