//! Concurrent test execution
//!
//! A bounded pool of scoped worker threads pulls targets from a queue, runs
//! one test-command subprocess per target and decodes its output with a
//! dedicated `StreamProcessor`.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;

use super::stream::{Interruption, StreamProcessor, DEFAULT_CONTEXT_LINES};
use crate::application::cancel::CancelToken;
use crate::domain::entities::{ErrorKind, ExecutionResult, TestError, TestResult, TestSuite};
use crate::domain::ports::TestCommand;
use crate::domain::value_objects::TestTarget;
use crate::error::SentinelError;

/// How long a killed subprocess gets to be reaped
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Scheduler options
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Deadline for one subprocess; `None` disables it
    pub test_timeout: Option<Duration>,
    /// Source lines of context around a failure
    pub context_lines: usize,
    /// Grace period for reaping a killed subprocess
    pub kill_grace: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            test_timeout: None,
            context_lines: DEFAULT_CONTEXT_LINES,
            kill_grace: KILL_GRACE,
        }
    }
}

impl SchedulerOptions {
    pub fn with_test_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }
}

/// Packages with a subprocess currently running
///
/// Shared by every `execute` call on one scheduler so two runs never test
/// the same package at once.
#[derive(Default)]
struct InFlight {
    packages: Mutex<HashSet<String>>,
    released: Condvar,
}

struct InFlightGuard<'a> {
    registry: &'a InFlight,
    package: String,
}

impl InFlight {
    /// Claim a package, waiting while another run holds it.
    ///
    /// Returns `None` if cancelled while waiting.
    fn acquire(&self, package: &str, cancel: &CancelToken) -> Option<InFlightGuard<'_>> {
        let mut packages = self.packages.lock().unwrap_or_else(|e| e.into_inner());
        while packages.contains(package) {
            if cancel.is_cancelled() {
                return None;
            }
            tracing::debug!("{} already running, waiting", package);
            packages = match self.released.wait_timeout(packages, Duration::from_millis(50)) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        packages.insert(package.to_string());
        Some(InFlightGuard {
            registry: self,
            package: package.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut packages = self
            .registry
            .packages
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        packages.remove(&self.package);
        self.registry.released.notify_all();
    }
}

/// Outcome of one target
struct TargetOutcome {
    suite: TestSuite,
    parse_errors: usize,
    invoked: bool,
}

impl TargetOutcome {
    fn synthetic(suite: TestSuite) -> Self {
        Self {
            suite,
            parse_errors: 0,
            invoked: false,
        }
    }
}

/// Runs test targets on a bounded worker pool
pub struct ExecutionScheduler {
    command: Arc<dyn TestCommand>,
    options: SchedulerOptions,
    in_flight: InFlight,
}

impl ExecutionScheduler {
    pub fn new(command: Arc<dyn TestCommand>, options: SchedulerOptions) -> Self {
        Self {
            command,
            options,
            in_flight: InFlight::default(),
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Run every target, at most `max_concurrency` at a time.
    ///
    /// Suites come back in target order. A failing target never affects its
    /// siblings; a `max_concurrency` of 0 is treated as 1.
    pub fn execute(
        &self,
        cancel: &CancelToken,
        targets: Vec<TestTarget>,
        max_concurrency: usize,
    ) -> ExecutionResult {
        let started = Instant::now();
        if targets.is_empty() {
            return ExecutionResult::new();
        }

        let count = targets.len();
        let workers = max_concurrency.max(1).min(count);
        tracing::debug!("executing {} target(s) on {} worker(s)", count, workers);

        let (queue_tx, queue_rx) = channel::unbounded::<(usize, TestTarget)>();
        for job in targets.into_iter().enumerate() {
            // The receiver is alive until the scope below ends
            let _ = queue_tx.send(job);
        }
        drop(queue_tx);

        let slots: Mutex<Vec<Option<TargetOutcome>>> =
            Mutex::new((0..count).map(|_| None).collect());

        thread::scope(|scope| {
            for _ in 0..workers {
                let queue_rx = queue_rx.clone();
                let slots = &slots;
                scope.spawn(move || {
                    while let Ok((idx, target)) = queue_rx.recv() {
                        let outcome = self.run_target(cancel, &target);
                        let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());
                        slots[idx] = Some(outcome);
                    }
                });
            }
        });

        let mut result = ExecutionResult::new();
        let slots = slots.into_inner().unwrap_or_else(|e| e.into_inner());
        for outcome in slots.into_iter().flatten() {
            result.parse_errors += outcome.parse_errors;
            if outcome.invoked {
                result.invocations += 1;
            }
            result.add_suite(outcome.suite);
        }
        result.duration = started.elapsed();
        result
    }

    fn run_target(&self, cancel: &CancelToken, target: &TestTarget) -> TargetOutcome {
        if cancel.is_cancelled() {
            return TargetOutcome::synthetic(placeholder_suite(target, Interruption::Cancelled));
        }
        let Some(_guard) = self.in_flight.acquire(&target.package, cancel) else {
            return TargetOutcome::synthetic(placeholder_suite(target, Interruption::Cancelled));
        };

        let mut command = self.command.command(target);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("running {}", target);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = SentinelError::BuildFailure {
                    package: target.package.clone(),
                    message: format!("failed to start test command: {e}"),
                };
                tracing::warn!("{}", err);
                return TargetOutcome::synthetic(build_failure_suite(target, err.to_string()));
            }
        };

        let mut processor = StreamProcessor::new(
            target.package.clone(),
            target.dir.clone(),
            self.options.context_lines,
        );
        let (line_rx, stderr_rx) = spawn_readers(&mut child);

        let timeout = self
            .options
            .test_timeout
            .map(channel::after)
            .unwrap_or_else(channel::never);

        let interruption = loop {
            channel::select! {
                recv(line_rx) -> msg => match msg {
                    Ok(line) => processor.feed(&line),
                    Err(_) => break None,
                },
                recv(cancel.receiver()) -> _ => break Some(Interruption::Cancelled),
                recv(timeout) -> _ => break Some(Interruption::Timeout),
            }
        };

        let parse_errors;
        let suite = match interruption {
            None => {
                let status = child.wait();
                let stderr = stderr_rx
                    .recv_timeout(self.options.kill_grace)
                    .unwrap_or_default();
                parse_errors = processor.parse_errors();
                let suite = processor.finalize();
                finish_suite(target, suite, status, stderr)
            }
            Some(reason) => {
                if reason == Interruption::Timeout {
                    let after = self.options.test_timeout.unwrap_or_default();
                    tracing::warn!(
                        "{}",
                        SentinelError::Timeout {
                            package: target.package.clone(),
                            after,
                        }
                    );
                } else {
                    tracing::debug!("{} cancelled", target.package);
                }
                kill_and_reap(&mut child, self.options.kill_grace);
                // Drain lines already read; the reader may stay blocked if a
                // grandchild still holds the pipe.
                while let Ok(line) = line_rx.try_recv() {
                    processor.feed(&line);
                }
                parse_errors = processor.parse_errors();
                interrupted_suite(target, processor, reason)
            }
        };

        TargetOutcome {
            suite,
            parse_errors,
            invoked: true,
        }
    }
}

/// Forward stdout line by line and collect stderr, each on its own thread
fn spawn_readers(child: &mut Child) -> (channel::Receiver<String>, channel::Receiver<String>) {
    let (line_tx, line_rx) = channel::unbounded();
    let (stderr_tx, stderr_rx) = channel::bounded(1);

    if let Some(stdout) = child.stdout.take() {
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("stopped reading test output: {}", e);
                        break;
                    }
                }
            }
        });
    }

    if let Some(mut stderr) = child.stderr.take() {
        thread::spawn(move || {
            let mut buf = String::new();
            if let Err(e) = stderr.read_to_string(&mut buf) {
                tracing::debug!("stopped reading test stderr: {}", e);
            }
            let _ = stderr_tx.send(buf);
        });
    } else {
        let _ = stderr_tx.send(String::new());
    }

    (line_rx, stderr_rx)
}

fn kill_and_reap(child: &mut Child, grace: Duration) {
    if let Err(e) = child.kill() {
        tracing::debug!("kill failed (already exited?): {}", e);
    }
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            Ok(None) => {
                tracing::warn!("test process {} not reaped after {:?}", child.id(), grace);
                return;
            }
            Err(e) => {
                tracing::warn!("failed to reap test process: {}", e);
                return;
            }
        }
    }
}

/// Turn a non-zero exit without results into a build failure
fn finish_suite(
    target: &TestTarget,
    suite: TestSuite,
    status: std::io::Result<ExitStatus>,
    stderr: String,
) -> TestSuite {
    let success = match &status {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::warn!("failed to wait for {}: {}", target.package, e);
            false
        }
    };
    if success || !suite.is_empty() {
        return suite;
    }

    let message = stderr.trim();
    let message = if message.is_empty() {
        match status {
            Ok(status) => format!("test command exited with {status}"),
            Err(e) => e.to_string(),
        }
    } else {
        message.to_string()
    };
    tracing::info!("{}: build failed", target.package);
    build_failure_suite(target, message)
}

fn build_failure_suite(target: &TestTarget, message: String) -> TestSuite {
    let result = TestResult::failed(
        target.package.clone(),
        target.package.clone(),
        TestError::new(ErrorKind::BuildFailure, message),
    );
    TestSuite::from_tests(target.package.clone(), vec![result])
}

/// Suite for an interrupted run, including selected tests that never started
fn interrupted_suite(
    target: &TestTarget,
    processor: StreamProcessor,
    reason: Interruption,
) -> TestSuite {
    let mut suite = processor.interrupt(reason);
    for name in &target.test_names {
        if suite.find(name).is_none() {
            suite.push(interrupted_result(target, name, reason));
        }
    }
    if suite.is_empty() {
        suite.push(interrupted_result(target, &target.package, reason));
    }
    suite
}

/// Suite for a target that never started
fn placeholder_suite(target: &TestTarget, reason: Interruption) -> TestSuite {
    let names: Vec<&str> = if target.is_whole_package() {
        vec![target.package.as_str()]
    } else {
        target.test_names.iter().map(String::as_str).collect()
    };
    TestSuite::from_tests(
        target.package.clone(),
        names
            .into_iter()
            .map(|name| interrupted_result(target, name, reason))
            .collect(),
    )
}

fn interrupted_result(target: &TestTarget, name: &str, reason: Interruption) -> TestResult {
    TestResult::failed(
        target.package.clone(),
        name,
        TestError::new(reason.kind(), reason.message()),
    )
}
