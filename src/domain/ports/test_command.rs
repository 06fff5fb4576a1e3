//! Test Command Port
//!
//! Builds the subprocess that runs one test target. The process must write
//! `go test -json` events to stdout.

use std::process::Command;

use crate::domain::value_objects::TestTarget;

pub trait TestCommand: Send + Sync {
    /// Build the command for a target; stdio is configured by the caller
    fn command(&self, target: &TestTarget) -> Command;
}
