//! Streaming decoder for `go test -json` output
//!
//! One processor per invocation. Lines are fed as they arrive; the suite is
//! built when the stream ends (`finalize`) or is cut short (`interrupt`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::domain::entities::{
    ErrorKind, SourceLocation, TestError, TestResult, TestStatus, TestSuite,
};
use crate::error::SentinelError;

/// Default number of source lines shown around a failure
pub const DEFAULT_CONTEXT_LINES: usize = 5;

/// `file.go:LINE: message` as printed by `t.Error` and friends
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([\w./\\-]+\.go):(\d+)(?::\d+)?:\s?(.*)$").expect("location regex is valid")
});

/// Goroutine trace frame: `\t/abs/path/file.go:LINE +0x1d`
static TRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\S+\.go):(\d+)(?:\s|$)").expect("trace regex is valid")
});

/// One decoded event line
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TestEvent {
    #[allow(dead_code)]
    time: Option<String>,
    action: String,
    #[allow(dead_code)]
    package: Option<String>,
    test: Option<String>,
    elapsed: Option<f64>,
    output: Option<String>,
}

/// Why a stream was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Timeout,
    Cancelled,
}

impl Interruption {
    pub fn message(self) -> &'static str {
        match self {
            Interruption::Timeout => "timeout",
            Interruption::Cancelled => "cancelled",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            Interruption::Timeout => ErrorKind::Timeout,
            Interruption::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[derive(Debug)]
struct TestState {
    name: String,
    status: Option<TestStatus>,
    elapsed: Duration,
    output: Vec<String>,
}

impl TestState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: None,
            elapsed: Duration::ZERO,
            output: Vec::new(),
        }
    }
}

/// Incremental decoder for one package's event stream
#[derive(Debug)]
pub struct StreamProcessor {
    package: String,
    dir: PathBuf,
    context_lines: usize,
    tests: Vec<TestState>,
    positions: HashMap<String, usize>,
    package_output: Vec<String>,
    package_status: Option<TestStatus>,
    package_elapsed: Option<Duration>,
    lines_seen: usize,
    parse_errors: usize,
}

impl StreamProcessor {
    pub fn new(package: impl Into<String>, dir: impl Into<PathBuf>, context_lines: usize) -> Self {
        Self {
            package: package.into(),
            dir: dir.into(),
            context_lines,
            tests: Vec::new(),
            positions: HashMap::new(),
            package_output: Vec::new(),
            package_status: None,
            package_elapsed: None,
            lines_seen: 0,
            parse_errors: 0,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Undecodable lines skipped so far
    pub fn parse_errors(&self) -> usize {
        self.parse_errors
    }

    /// Names of tests that have not reported a terminal event
    pub fn open_tests(&self) -> Vec<&str> {
        self.tests
            .iter()
            .filter(|t| t.status.is_none())
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Decode one line and update the in-flight suite
    pub fn feed(&mut self, line: &str) {
        self.lines_seen += 1;
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let event: TestEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                self.parse_errors += 1;
                let err = SentinelError::Parse {
                    line: self.lines_seen,
                    message: e.to_string(),
                };
                tracing::warn!("{}: {}", self.package, err);
                return;
            }
        };

        let elapsed = event
            .elapsed
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        match (event.action.as_str(), event.test.as_deref()) {
            ("run", Some(test)) => {
                self.open(test);
            }
            ("output", Some(test)) => {
                if let Some(output) = event.output {
                    let idx = self.open(test);
                    self.tests[idx].output.push(strip_newline(output));
                }
            }
            ("output", None) => {
                if let Some(output) = event.output {
                    self.package_output.push(strip_newline(output));
                }
            }
            (action @ ("pass" | "fail" | "skip"), Some(test)) => {
                let idx = self.open(test);
                let state = &mut self.tests[idx];
                state.status = Some(status_of(action));
                state.elapsed = elapsed.unwrap_or_default();
            }
            (action @ ("pass" | "fail" | "skip"), None) => {
                self.package_status = Some(status_of(action));
                self.package_elapsed = elapsed;
            }
            _ => {
                tracing::trace!("ignoring '{}' event", event.action);
            }
        }
    }

    fn open(&mut self, test: &str) -> usize {
        if let Some(&idx) = self.positions.get(test) {
            return idx;
        }
        self.tests.push(TestState::new(test));
        let idx = self.tests.len() - 1;
        self.positions.insert(test.to_string(), idx);
        idx
    }

    /// Build the suite once the stream has ended.
    ///
    /// Tests that never reported a terminal event are marked failed.
    pub fn finalize(self) -> TestSuite {
        self.build(None)
    }

    /// Build the suite after the stream was cut short.
    ///
    /// Every test without a terminal event fails with the interruption reason.
    pub fn interrupt(self, reason: Interruption) -> TestSuite {
        self.build(Some(reason))
    }

    fn build(self, interruption: Option<Interruption>) -> TestSuite {
        let failed_children = self.failed_subtest_counts();
        let mut results = Vec::with_capacity(self.tests.len() + 1);

        for state in &self.tests {
            let result = match state.status {
                Some(TestStatus::Failed) => {
                    let error = self.failure_error(state, failed_children.get(&state.name));
                    self.result(state, TestStatus::Failed, Some(error))
                }
                Some(status) => self.result(state, status, None),
                None => {
                    let error = match interruption {
                        Some(reason) => TestError::new(reason.kind(), reason.message()),
                        None => TestError::new(ErrorKind::TestFailure, "no result reported"),
                    };
                    self.result(state, TestStatus::Failed, Some(error))
                }
            };
            results.push(result);
        }

        if results.is_empty() && self.package_status == Some(TestStatus::Failed) {
            results.push(self.build_failure());
        }

        let mut suite = TestSuite::from_tests(self.package.clone(), results);
        suite.duration = self
            .package_elapsed
            .or_else(|| self.tests.iter().map(|t| t.elapsed).max())
            .unwrap_or_default();
        suite
    }

    fn result(&self, state: &TestState, status: TestStatus, error: Option<TestError>) -> TestResult {
        let mut result =
            TestResult::new(self.package.clone(), state.name.clone(), status).with_duration(state.elapsed);
        result.output = state.output.clone();
        result.error = error;
        result
    }

    /// Direct failed subtests per parent name
    fn failed_subtest_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for state in &self.tests {
            if state.status != Some(TestStatus::Failed) {
                continue;
            }
            if let Some((parent, _)) = state.name.rsplit_once('/') {
                *counts.entry(parent.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn failure_error(&self, state: &TestState, failed_subtests: Option<&usize>) -> TestError {
        if let Some(error) = self.panic_error(&state.output) {
            return error;
        }

        if let Some((location, message)) = find_location(&state.output) {
            let message = if message.is_empty() {
                "test failed".to_string()
            } else {
                message
            };
            let error = TestError::new(ErrorKind::from_message(&message), message);
            return self.with_source(error, location);
        }

        if let Some(&n) = failed_subtests {
            let plural = if n == 1 { "" } else { "s" };
            return TestError::new(
                ErrorKind::SubtestFailure,
                format!("test failed due to {n} failed subtest{plural}"),
            );
        }

        match first_meaningful(&state.output) {
            Some(line) => TestError::new(ErrorKind::from_message(line), line),
            None => TestError::new(ErrorKind::TestFailure, "test failed"),
        }
    }

    fn panic_error(&self, output: &[String]) -> Option<TestError> {
        let start = output
            .iter()
            .position(|line| line.trim_start().starts_with("panic:"))?;
        let message = output[start].trim().to_string();
        let error = TestError::new(ErrorKind::from_message(&message), message);

        // First frame that points into this package
        let frame = output[start + 1..].iter().find_map(|line| {
            let caps = TRACE_RE.captures(line)?;
            let file = PathBuf::from(&caps[1]);
            let line: usize = caps[2].parse().ok()?;
            (file.starts_with(&self.dir) && !file.ends_with("testing.go"))
                .then_some(SourceLocation { file, line })
        });
        Some(match frame {
            Some(location) => self.with_source(error, location),
            None => error,
        })
    }

    fn build_failure(&self) -> TestResult {
        let mut lines = self
            .package_output
            .iter()
            .filter(|l| is_meaningful(l))
            .map(|l| l.trim_end())
            .peekable();
        let message = if lines.peek().is_some() {
            lines.collect::<Vec<_>>().join("\n")
        } else {
            "build failed".to_string()
        };

        let mut error = TestError::new(ErrorKind::BuildFailure, message);
        if let Some((location, _)) = find_location(&self.package_output) {
            error = self.with_source(error, location);
        }
        let mut result = TestResult::failed(self.package.clone(), self.package.clone(), error);
        result.output = self.package_output.clone();
        result
    }

    /// Attach location and the surrounding source lines
    fn with_source(&self, error: TestError, location: SourceLocation) -> TestError {
        let path = if location.file.is_absolute() {
            location.file.clone()
        } else {
            self.dir.join(&location.file)
        };
        let context = read_context(&path, location.line, self.context_lines);
        let error = error.with_location(location);
        match context {
            Some((lines, highlighted)) => error.with_context(lines, highlighted),
            None => error,
        }
    }
}

fn status_of(action: &str) -> TestStatus {
    match action {
        "pass" => TestStatus::Passed,
        "skip" => TestStatus::Skipped,
        _ => TestStatus::Failed,
    }
}

fn strip_newline(mut output: String) -> String {
    while output.ends_with('\n') || output.ends_with('\r') {
        output.pop();
    }
    output
}

/// Lines the test binary prints about itself rather than about the failure
fn is_meaningful(line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.is_empty()
        || trimmed.starts_with("=== ")
        || trimmed.starts_with("--- ")
        || trimmed == "FAIL"
        || trimmed == "PASS"
        || trimmed.starts_with("FAIL\t")
        || trimmed.starts_with("ok \t")
        || trimmed.starts_with("ok  \t")
        || trimmed.starts_with("exit status "))
}

fn first_meaningful(output: &[String]) -> Option<&str> {
    output
        .iter()
        .map(|l| l.trim())
        .find(|l| is_meaningful(l))
}

fn find_location(output: &[String]) -> Option<(SourceLocation, String)> {
    output.iter().find_map(|line| {
        let caps = LOCATION_RE.captures(line)?;
        let line_no: usize = caps[2].parse().ok()?;
        Some((
            SourceLocation {
                file: PathBuf::from(&caps[1]),
                line: line_no,
            },
            caps[3].trim().to_string(),
        ))
    })
}

/// Read a window of `count` lines centered on 1-based `line`.
///
/// Returns the lines and the 0-based index of `line` within them, or `None`
/// when the file cannot be read or the line is out of range.
pub fn read_context(path: &Path, line: usize, count: usize) -> Option<(Vec<String>, usize)> {
    if count == 0 || line == 0 {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("no source context for {}: {}", path.display(), e);
            return None;
        }
    };
    let lines: Vec<&str> = content.lines().collect();
    if line > lines.len() {
        return None;
    }

    let target = line - 1;
    let before = (count - 1) / 2;
    let after = count - 1 - before;
    let start = target.saturating_sub(before);
    let end = (target + after + 1).min(lines.len());
    let window = lines[start..end].iter().map(|l| l.to_string()).collect();
    Some((window, target - start))
}
