//! JSON Result Sink
//!
//! Outputs engine events as NDJSON for CI/automation consumption.

use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::domain::entities::{TestError, TestResult};
use crate::domain::ports::{EngineEvent, ResultSink, RunReport, RunTrigger};

/// Event sink that outputs NDJSON events to stdout
pub struct JsonResultSink {
    /// Mutex to ensure thread-safe writes
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonResultSink {
    /// Create a new JSON sink writing to stdout
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a JSON sink writing to a custom writer
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_event(&self, event: Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", event);
            let _ = writer.flush();
        }
    }
}

impl ResultSink for JsonResultSink {
    fn on_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Started { root } => self.write_event(json!({
                "event": "start",
                "root": root.display().to_string(),
            })),

            EngineEvent::StateChanged { from, to } => self.write_event(json!({
                "event": "state",
                "from": from.as_str(),
                "to": to.as_str(),
            })),

            EngineEvent::RunCompleted(report) => {
                for result in report.result.results() {
                    self.write_event(result_json(result));
                }
                self.write_event(summary_json(&report));
            }

            EngineEvent::Error { message } => self.write_event(json!({
                "event": "error",
                "message": message,
            })),

            EngineEvent::Stopped => self.write_event(json!({ "event": "shutdown" })),
        }
    }
}

fn result_json(result: &TestResult) -> Value {
    let mut value = json!({
        "event": "test",
        "package": result.package,
        "name": result.name,
        "status": result.status.as_str(),
        "duration_ms": result.duration.as_millis() as u64,
    });
    if let (Some(error), Some(obj)) = (&result.error, value.as_object_mut()) {
        obj.insert("error".to_string(), error_json(error));
    }
    value
}

fn error_json(error: &TestError) -> Value {
    let mut value = json!({
        "kind": error.kind.as_str(),
        "message": error.message,
    });
    if let (Some(location), Some(obj)) = (&error.location, value.as_object_mut()) {
        obj.insert("file".to_string(), json!(location.file.display().to_string()));
        obj.insert("line".to_string(), json!(location.line));
        if !error.context_lines.is_empty() {
            obj.insert("context".to_string(), json!(error.context_lines));
            obj.insert("highlighted".to_string(), json!(error.highlighted_line));
        }
    }
    value
}

fn summary_json(report: &RunReport) -> Value {
    let result = &report.result;
    let changed: Vec<String> = match &report.trigger {
        RunTrigger::Changes(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
        _ => Vec::new(),
    };
    json!({
        "event": "run_complete",
        "trigger": report.trigger.as_str(),
        "changed": changed,
        "status": if result.has_failures() { "failure" } else { "success" },
        "total": result.total(),
        "passed": result.passed(),
        "failed": result.failed(),
        "skipped": result.skipped(),
        "duration_ms": result.duration.as_millis() as u64,
        "invocations": result.invocations,
        "cached_targets": result.cached_targets,
        "parse_errors": result.parse_errors,
        "cache": {
            "hits": report.stats.hits,
            "misses": report.stats.misses,
            "evictions": report.stats.evictions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ErrorKind, ExecutionResult, SourceLocation, TestStatus, TestSuite};
    use crate::domain::ports::{CacheStats, WatchState};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct TestWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl TestWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    buffer: buffer.clone(),
                },
                buffer,
            )
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(events: Vec<EngineEvent>) -> String {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonResultSink::with_writer(writer);
        for event in events {
            sink.on_event(event);
        }
        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn report() -> RunReport {
        let passed = TestResult::new(
            "internal/config",
            "TestLoadConfig_ValidFile",
            TestStatus::Passed,
        )
        .with_duration(Duration::from_millis(12));
        let error = TestError::new(ErrorKind::AssertionError, "expected 3, got 4")
            .with_location(SourceLocation {
                file: PathBuf::from("internal/config/loader_test.go"),
                line: 6,
            })
            .with_context(
                vec!["a := 1".to_string(), "check(a)".to_string(), "}".to_string()],
                1,
            );
        let failed = TestResult::failed("internal/config", "TestLoadConfig_InvalidFile", error)
            .with_duration(Duration::from_millis(3));

        let mut result = ExecutionResult::new();
        result.add_suite(TestSuite::from_tests("internal/config", vec![passed, failed]));
        result.duration = Duration::from_millis(40);
        result.invocations = 1;

        RunReport {
            trigger: RunTrigger::Changes(vec![PathBuf::from("internal/config/loader.go")]),
            result,
            stats: CacheStats {
                hits: 2,
                misses: 1,
                evictions: 2,
            },
        }
    }

    #[test]
    fn lifecycle_events() {
        let output = capture(vec![
            EngineEvent::Started {
                root: PathBuf::from("/repo"),
            },
            EngineEvent::StateChanged {
                from: WatchState::Idle,
                to: WatchState::Watching,
            },
            EngineEvent::Error {
                message: "snapshot not saved".to_string(),
            },
            EngineEvent::Stopped,
        ]);

        insta::assert_snapshot!(output, @r#"
        {"event":"start","root":"/repo"}
        {"event":"state","from":"idle","to":"watching"}
        {"event":"error","message":"snapshot not saved"}
        {"event":"shutdown"}
        "#);
    }

    #[test]
    fn run_completed_emits_tests_then_summary() {
        let output = capture(vec![EngineEvent::RunCompleted(report())]);

        insta::assert_snapshot!(output, @r#"
        {"duration_ms":12,"event":"test","name":"TestLoadConfig_ValidFile","package":"internal/config","status":"passed"}
        {"duration_ms":3,"error":{"context":["a := 1","check(a)","}"],"file":"internal/config/loader_test.go","highlighted":1,"kind":"assertion_error","line":6,"message":"expected 3, got 4"},"event":"test","name":"TestLoadConfig_InvalidFile","package":"internal/config","status":"failed"}
        {"cache":{"evictions":2,"hits":2,"misses":1},"cached_targets":0,"changed":["internal/config/loader.go"],"duration_ms":40,"event":"run_complete","failed":1,"invocations":1,"parse_errors":0,"passed":1,"skipped":0,"status":"failure","total":2,"trigger":"changes"}
        "#);
    }

    #[test]
    fn every_line_is_valid_json() {
        let output = capture(vec![EngineEvent::RunCompleted(report())]);
        for line in output.lines() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert!(value.get("event").is_some());
        }
    }
}
