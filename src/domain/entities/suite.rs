//! TestSuite entity - all results of one package run

use std::path::PathBuf;
use std::time::Duration;

use super::test_result::{TestResult, TestStatus};

/// Ordered results of one package with derived counts
///
/// The counts are private and recomputed by every mutation, so
/// `passed + failed + skipped == tests().len()` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    pub file_path: PathBuf,
    tests: Vec<TestResult>,
    passed: usize,
    failed: usize,
    skipped: usize,
    pub duration: Duration,
}

impl TestSuite {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    pub fn from_tests(file_path: impl Into<PathBuf>, tests: Vec<TestResult>) -> Self {
        let mut suite = Self::new(file_path);
        suite.tests = tests;
        suite.recount();
        suite
    }

    pub fn tests(&self) -> &[TestResult] {
        &self.tests
    }

    pub fn into_tests(self) -> Vec<TestResult> {
        self.tests
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn push(&mut self, result: TestResult) {
        self.count(result.status);
        self.tests.push(result);
    }

    /// Insert or replace the result with the same name, keeping first position
    pub fn upsert(&mut self, result: TestResult) {
        match self.tests.iter_mut().find(|t| t.name == result.name) {
            Some(existing) => *existing = result,
            None => self.tests.push(result),
        }
        self.recount();
    }

    /// Append the tests of another suite for the same package
    pub fn merge(&mut self, other: TestSuite) {
        if self.file_path.as_os_str().is_empty() {
            self.file_path = other.file_path;
        }
        self.duration += other.duration;
        for result in other.tests {
            self.upsert(result);
        }
    }

    pub fn find(&self, name: &str) -> Option<&TestResult> {
        self.tests.iter().find(|t| t.name == name)
    }

    fn count(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
    }

    fn recount(&mut self) {
        self.passed = 0;
        self.failed = 0;
        self.skipped = 0;
        let statuses: Vec<TestStatus> = self.tests.iter().map(|t| t.status).collect();
        for status in statuses {
            self.count(status);
        }
    }
}
