//! ExecutionResult entity - merged outcome of one run

use std::time::Duration;

use super::suite::TestSuite;
use super::test_result::TestResult;

/// Suites of one run plus bookkeeping about how they were produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// One suite per package, in target order
    pub suites: Vec<TestSuite>,
    pub duration: Duration,
    /// Number of test-command subprocesses started
    pub invocations: usize,
    /// Undecodable output lines skipped across all invocations
    pub parse_errors: usize,
    /// Targets answered entirely from the cache
    pub cached_targets: usize,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a suite, merging with an existing suite for the same package
    pub fn add_suite(&mut self, suite: TestSuite) {
        match self
            .suites
            .iter_mut()
            .find(|s| s.file_path == suite.file_path)
        {
            Some(existing) => existing.merge(suite),
            None => self.suites.push(suite),
        }
    }

    /// Fold another result into this one; suite counts are recomputed
    pub fn merge(&mut self, other: ExecutionResult) {
        for suite in other.suites {
            self.add_suite(suite);
        }
        self.duration = self.duration.max(other.duration);
        self.invocations += other.invocations;
        self.parse_errors += other.parse_errors;
        self.cached_targets += other.cached_targets;
    }

    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.suites.iter().flat_map(|s| s.tests().iter())
    }

    pub fn total(&self) -> usize {
        self.suites.iter().map(TestSuite::len).sum()
    }

    pub fn passed(&self) -> usize {
        self.suites.iter().map(TestSuite::passed).sum()
    }

    pub fn failed(&self) -> usize {
        self.suites.iter().map(TestSuite::failed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.suites.iter().map(TestSuite::skipped).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.suites.iter().any(TestSuite::has_failures)
    }
}
