//! TestResult entity - outcome of a single test (or subtest)

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::TestKey;

/// Terminal status of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a test failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TestFailure,
    AssertionError,
    Panic,
    Timeout,
    SubtestFailure,
    BuildFailure,
    Cancelled,
}

impl ErrorKind {
    /// Infer the kind from the failure message text
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if lower.contains("panic") {
            ErrorKind::Panic
        } else if lower.contains("expected") {
            ErrorKind::AssertionError
        } else {
            ErrorKind::TestFailure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TestFailure => "test_failure",
            ErrorKind::AssertionError => "assertion_error",
            ErrorKind::Panic => "panic",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SubtestFailure => "subtest_failure",
            ErrorKind::BuildFailure => "build_failure",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// A `file:line` position reported in test output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Details of why a test failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Source lines surrounding `location`
    pub context_lines: Vec<String>,
    /// Index into `context_lines` of the reported line
    pub highlighted_line: Option<usize>,
}

impl TestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            context_lines: Vec::new(),
            highlighted_line: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_context(mut self, lines: Vec<String>, highlighted: usize) -> Self {
        self.highlighted_line = (highlighted < lines.len()).then_some(highlighted);
        self.context_lines = lines;
        self
    }
}

/// Outcome of one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub package: String,
    pub status: TestStatus,
    pub duration: Duration,
    /// Output lines in arrival order, trailing newlines stripped
    pub output: Vec<String>,
    pub error: Option<TestError>,
}

impl TestResult {
    pub fn new(package: impl Into<String>, name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            status,
            duration: Duration::ZERO,
            output: Vec::new(),
            error: None,
        }
    }

    /// A failed result carrying an error
    pub fn failed(package: impl Into<String>, name: impl Into<String>, error: TestError) -> Self {
        let mut result = Self::new(package, name, TestStatus::Failed);
        result.error = Some(error);
        result
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn key(&self) -> TestKey {
        TestKey::new(self.package.clone(), self.name.clone())
    }

    /// Name of the enclosing test, for subtests
    pub fn parent(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(parent, _)| parent)
    }

    pub fn is_subtest(&self) -> bool {
        self.name.contains('/')
    }

    /// Build failures, timeouts and cancellations say nothing about the test
    /// itself and are never cached.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::BuildFailure | ErrorKind::Timeout | ErrorKind::Cancelled)
        )
    }
}
