//! Watch coordinator
//!
//! Owns the watch loop: raw changes go through the debouncer, settled
//! batches start test cycles, and finished cycles are published to the
//! result sink. At most one cycle runs at a time; batches that settle while
//! a cycle is in flight are merged and run right after it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel as channel;

use super::cycle::TestCycle;
use super::debouncer::Debouncer;
use crate::application::analysis::{ChangeAnalyzer, ResultCache};
use crate::application::cancel::CancelToken;
use crate::application::execution::ExecutionScheduler;
use crate::config::EngineConfig;
use crate::domain::ports::{EngineEvent, ResultSink, RunReport, RunTrigger, WatchState};
use crate::domain::value_objects::{Batch, FileChange, IgnorePatterns, IGNORE_FILE};
use crate::error::{SentinelError, SentinelResult};
use crate::infrastructure::persistence::SnapshotStore;
use crate::infrastructure::watcher::FsWatcher;

enum Control {
    RunAll,
    Stop,
}

enum Job {
    Known(RunTrigger),
    Changes(Batch),
}

/// State visible to both the handle and the loop thread
struct Shared {
    state: Mutex<WatchState>,
    sink: Arc<dyn ResultSink>,
}

impl Shared {
    fn state(&self) -> WatchState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, to: WatchState) {
        let from = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            tracing::debug!("{} -> {}", from.as_str(), to.as_str());
            self.sink.on_event(EngineEvent::StateChanged { from, to });
        }
    }

    fn publish(&self, event: EngineEvent) {
        self.sink.on_event(event);
    }
}

/// Stops a running coordinator from another thread (e.g. a signal handler)
#[derive(Clone)]
pub struct StopHandle {
    control: channel::Sender<Control>,
    cancel: CancelToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
        let _ = self.control.send(Control::Stop);
    }
}

struct Session {
    control: channel::Sender<Control>,
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

/// Drives watch sessions and one-shot runs
pub struct WatchCoordinator {
    config: EngineConfig,
    cache: Arc<ResultCache>,
    scheduler: Arc<ExecutionScheduler>,
    shared: Arc<Shared>,
    session: Option<Session>,
}

impl WatchCoordinator {
    pub fn new(
        config: EngineConfig,
        cache: Arc<ResultCache>,
        scheduler: Arc<ExecutionScheduler>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            config,
            cache,
            scheduler,
            shared: Arc::new(Shared {
                state: Mutex::new(WatchState::Idle),
                sink,
            }),
            session: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn state(&self) -> WatchState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Start watching the configured root
    ///
    /// Errors here are session-setup failures; nothing has been started.
    pub fn start(&mut self) -> SentinelResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let root = self.resolve_root()?;
        let ignore = self.load_ignore(&root)?;
        let (watcher, changes) = FsWatcher::start(&root, ignore.clone())?;
        self.launch(root, ignore, changes, Some(watcher));
        Ok(())
    }

    /// Start a session fed by an external change source instead of the
    /// filesystem watcher
    pub fn start_with_changes(
        &mut self,
        changes: channel::Receiver<FileChange>,
    ) -> SentinelResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let root = self.resolve_root()?;
        let ignore = self.load_ignore(&root)?;
        self.launch(root, ignore, changes, None);
        Ok(())
    }

    /// Request an on-demand full run. Returns false when not watching.
    pub fn run_all(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.control.send(Control::RunAll).is_ok())
    }

    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.session.as_ref().map(|s| StopHandle {
            control: s.control.clone(),
            cancel: s.cancel.clone(),
        })
    }

    /// Cancel running tests, stop watching and join every thread (idempotent)
    pub fn stop(&mut self) {
        if let Some(handle) = self.stop_handle() {
            handle.stop();
        }
        self.wait();
    }

    /// Block until the session ends
    pub fn wait(&mut self) {
        if let Some(session) = self.session.take() {
            if session.worker.join().is_err() {
                tracing::error!("watch loop panicked");
                self.shared.transition(WatchState::Idle);
            }
        }
    }

    /// Run every known target once, without watching
    pub fn run_once(&self, cancel: &CancelToken) -> SentinelResult<RunReport> {
        let root = self.resolve_root()?;
        let ignore = self.load_ignore(&root)?;
        let runner = self.runner(root, ignore, cancel.clone());

        self.shared.transition(WatchState::Executing);
        let report = runner.cycle.run_known(cancel, RunTrigger::Manual);
        runner.publish(report.clone());
        self.shared.transition(WatchState::Idle);
        Ok(report)
    }

    fn resolve_root(&self) -> SentinelResult<PathBuf> {
        self.config
            .root
            .canonicalize()
            .map_err(|e| SentinelError::WatchSetup {
                path: self.config.root.clone(),
                message: e.to_string(),
            })
    }

    fn load_ignore(&self, root: &Path) -> SentinelResult<IgnorePatterns> {
        IgnorePatterns::load(root, &self.config.effective_ignore_patterns()).map_err(|e| {
            SentinelError::Config {
                file: root.join(IGNORE_FILE),
                message: e.to_string(),
            }
        })
    }

    fn runner(&self, root: PathBuf, ignore: IgnorePatterns, cancel: CancelToken) -> Runner {
        let analyzer = ChangeAnalyzer::new(
            root,
            self.config.watch_mode,
            ignore,
            Arc::clone(&self.cache),
        );
        Runner {
            cycle: TestCycle::new(
                Arc::new(analyzer),
                Arc::clone(&self.cache),
                Arc::clone(&self.scheduler),
                self.config.max_concurrency,
            ),
            shared: Arc::clone(&self.shared),
            cancel,
            snapshot: self.config.cache_file().map(SnapshotStore::new),
        }
    }

    fn launch(
        &mut self,
        root: PathBuf,
        ignore: IgnorePatterns,
        changes: channel::Receiver<FileChange>,
        watcher: Option<FsWatcher>,
    ) {
        let cancel = CancelToken::new();
        let (control_tx, control_rx) = channel::unbounded();

        self.shared.publish(EngineEvent::Started { root: root.clone() });
        self.shared.transition(WatchState::Watching);

        let event_loop = EventLoop {
            runner: self.runner(root, ignore, cancel.clone()),
            quiet_period: self.config.quiet_period,
            run_on_start: self.config.run_on_start,
        };
        let worker = thread::spawn(move || event_loop.run(control_rx, changes, watcher));

        self.session = Some(Session {
            control: control_tx,
            cancel,
            worker,
        });
    }
}

impl Drop for WatchCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything a cycle needs, shareable with run threads
#[derive(Clone)]
struct Runner {
    cycle: TestCycle,
    shared: Arc<Shared>,
    cancel: CancelToken,
    snapshot: Option<SnapshotStore>,
}

impl Runner {
    fn spawn(&self, job: Job, done: &channel::Sender<RunReport>) -> JoinHandle<()> {
        self.shared.transition(WatchState::Executing);
        let cycle = self.cycle.clone();
        let cancel = self.cancel.clone();
        let done = done.clone();
        thread::spawn(move || {
            let report = match job {
                Job::Known(trigger) => cycle.run_known(&cancel, trigger),
                Job::Changes(batch) => cycle.run_batch(&cancel, &batch),
            };
            let _ = done.send(report);
        })
    }

    fn publish(&self, report: RunReport) {
        self.shared.transition(WatchState::Publishing);
        tracing::info!(
            "run finished: {} passed, {} failed, {} skipped",
            report.result.passed(),
            report.result.failed(),
            report.result.skipped()
        );
        self.shared.publish(EngineEvent::RunCompleted(report));
        self.save_snapshot();
    }

    fn save_snapshot(&self) {
        let Some(store) = &self.snapshot else {
            return;
        };
        if let Err(e) = store.save(self.cycle.cache()) {
            tracing::warn!("could not save cache snapshot: {e}");
            self.shared.publish(EngineEvent::Error {
                message: format!("could not save cache snapshot: {e}"),
            });
        }
    }

    fn join(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::error!("test run panicked");
            self.shared.publish(EngineEvent::Error {
                message: "test run panicked".to_string(),
            });
        }
    }
}

struct EventLoop {
    runner: Runner,
    quiet_period: std::time::Duration,
    run_on_start: bool,
}

impl EventLoop {
    fn run(
        self,
        control: channel::Receiver<Control>,
        changes: channel::Receiver<FileChange>,
        mut watcher: Option<FsWatcher>,
    ) {
        let runner = &self.runner;
        let (mut debouncer, batches) = Debouncer::start(self.quiet_period);
        let (done_tx, done_rx) = channel::unbounded::<RunReport>();
        let closed = channel::never::<FileChange>();
        let mut changes_open = true;

        let mut running: Option<JoinHandle<()>> = None;
        let mut buffered: Option<Batch> = None;
        let mut full_requested = false;

        if self.run_on_start {
            running = Some(runner.spawn(Job::Known(RunTrigger::Startup), &done_tx));
        }

        loop {
            let source = if changes_open { &changes } else { &closed };
            channel::select! {
                recv(control) -> msg => match msg {
                    Ok(Control::RunAll) => {
                        if running.is_some() {
                            full_requested = true;
                        } else {
                            running = Some(runner.spawn(Job::Known(RunTrigger::Manual), &done_tx));
                        }
                    }
                    Ok(Control::Stop) | Err(_) => break,
                },
                recv(source) -> msg => match msg {
                    Ok(change) => {
                        if !debouncer.feed(change) {
                            break;
                        }
                        if running.is_none() {
                            runner.shared.transition(WatchState::Debouncing);
                        }
                    }
                    Err(_) => {
                        tracing::warn!("change source closed");
                        changes_open = false;
                    }
                },
                recv(batches) -> msg => match msg {
                    Ok(batch) => {
                        if running.is_some() {
                            tracing::debug!("run in flight, buffering {} change(s)", batch.len());
                            buffered.get_or_insert_with(Batch::default).absorb(batch);
                        } else {
                            running = Some(runner.spawn(Job::Changes(batch), &done_tx));
                        }
                    }
                    Err(_) => break,
                },
                recv(done_rx) -> msg => {
                    if let Some(handle) = running.take() {
                        runner.join(handle);
                    }
                    if let Ok(report) = msg {
                        runner.publish(report);
                    }

                    let next = match buffered.take() {
                        Some(batch) => Some(Job::Changes(batch)),
                        None if full_requested => {
                            full_requested = false;
                            Some(Job::Known(RunTrigger::Manual))
                        }
                        None => None,
                    };
                    match next {
                        Some(job) => {
                            // A buffered batch opens a fresh cycle
                            if matches!(job, Job::Changes(_)) {
                                runner.shared.transition(WatchState::Debouncing);
                            }
                            running = Some(runner.spawn(job, &done_tx));
                        }
                        None if debouncer.has_pending() => {
                            runner.shared.transition(WatchState::Debouncing)
                        }
                        None => runner.shared.transition(WatchState::Watching),
                    }
                }
            }
        }

        tracing::debug!("watch loop stopping");
        runner.cancel.cancel();
        debouncer.stop();
        if let Some(mut watcher) = watcher.take() {
            watcher.stop();
        }
        if let Some(handle) = running.take() {
            runner.join(handle);
            if let Ok(report) = done_rx.try_recv() {
                runner.publish(report);
            }
        }
        runner.shared.transition(WatchState::Idle);
        runner.shared.publish(EngineEvent::Stopped);
    }
}
