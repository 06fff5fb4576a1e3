//! Console Result Sink
//!
//! Human-readable run summaries with failure details and source context.

use std::io::{self, Write};
use std::sync::Mutex;

use is_terminal::IsTerminal;

use crate::domain::entities::{TestResult, TestStatus};
use crate::domain::ports::{EngineEvent, ResultSink, RunReport, RunTrigger};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Event sink that prints summaries for people
pub struct ConsoleResultSink {
    writer: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl ConsoleResultSink {
    /// Write to stdout, colored when stdout is a terminal
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            color: io::stdout().is_terminal(),
        }
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W, color: bool) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            color,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn write_lines(&self, lines: Vec<String>) {
        if let Ok(mut writer) = self.writer.lock() {
            for line in lines {
                let _ = writeln!(writer, "{line}");
            }
            let _ = writer.flush();
        }
    }

    fn render_report(&self, report: &RunReport) -> Vec<String> {
        let mut lines = Vec::new();
        if let RunTrigger::Changes(paths) = &report.trigger {
            for path in paths {
                lines.push(self.paint(DIM, &format!("changed: {}", path.display())));
            }
        }

        for result in report.result.results() {
            if result.status == TestStatus::Failed {
                self.render_failure(result, &mut lines);
            }
        }

        let result = &report.result;
        let summary = format!(
            "{} passed, {} failed, {} skipped ({} total) in {}ms [{} run, {} cached]",
            result.passed(),
            result.failed(),
            result.skipped(),
            result.total(),
            result.duration.as_millis(),
            result.invocations,
            result.cached_targets,
        );
        let code = if result.has_failures() { RED } else { GREEN };
        lines.push(self.paint(code, &summary));
        if result.parse_errors > 0 {
            lines.push(format!(
                "{} undecodable output line(s) skipped",
                result.parse_errors
            ));
        }
        lines
    }

    fn render_failure(&self, result: &TestResult, lines: &mut Vec<String>) {
        lines.push(self.paint(RED, &format!("FAIL {}::{}", result.package, result.name)));
        let Some(error) = &result.error else {
            return;
        };
        for message_line in error.message.lines() {
            lines.push(format!("    {message_line}"));
        }
        if let Some(location) = &error.location {
            lines.push(self.paint(
                DIM,
                &format!("    at {}:{}", location.file.display(), location.line),
            ));
        }
        for (idx, source) in error.context_lines.iter().enumerate() {
            let marker = if error.highlighted_line == Some(idx) {
                ">"
            } else {
                " "
            };
            lines.push(format!("  {marker} | {source}"));
        }
    }
}

impl ResultSink for ConsoleResultSink {
    fn on_event(&self, event: EngineEvent) {
        let lines = match event {
            EngineEvent::Started { root } => vec![format!("watching {}", root.display())],
            EngineEvent::RunCompleted(report) => self.render_report(&report),
            EngineEvent::Error { message } => vec![self.paint(RED, &format!("error: {message}"))],
            EngineEvent::Stopped => vec!["stopped".to_string()],
            EngineEvent::StateChanged { .. } => return,
        };
        self.write_lines(lines);
    }
}
