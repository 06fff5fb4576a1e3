//! Result Sink Implementations
//!
//! Provides concrete implementations of `ResultSink`:
//! - JsonResultSink: NDJSON output for CI/automation
//! - ConsoleResultSink: Human-readable run summaries

mod console;
mod json;

pub use console::ConsoleResultSink;
pub use json::JsonResultSink;
