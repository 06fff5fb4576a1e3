//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod result_sink;
pub mod test_command;

pub use result_sink::{
    CacheStats, CollectingSink, EngineEvent, NoopResultSink, ResultSink, RunReport, RunTrigger,
    WatchState,
};
pub use test_command::TestCommand;
