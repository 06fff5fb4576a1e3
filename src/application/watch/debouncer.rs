//! Debouncer - coalesces raw file changes into settled batches

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel as channel;

use crate::domain::value_objects::{Batch, FileChange};

/// Default quiet period in milliseconds
pub const DEBOUNCE_MS: u64 = 100;

#[derive(Debug)]
struct PendingGroup {
    dir: PathBuf,
    batch: Batch,
    deadline: Instant,
}

/// Pending debounce groups, keyed by package directory
///
/// Time is passed in explicitly so the grouping rules can be driven
/// without a worker thread.
#[derive(Debug)]
pub struct DebounceState {
    quiet_period: Duration,
    groups: Vec<PendingGroup>,
}

impl DebounceState {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            groups: Vec::new(),
        }
    }

    /// Record a change observed at `now`.
    ///
    /// Config and dependency changes flush at once, taking every pending
    /// group with them; anything else resets its group's deadline.
    pub fn add(&mut self, change: FileChange, now: Instant) -> Option<Batch> {
        if change.kind.is_global() {
            let mut batch = Batch::default();
            for group in self.groups.drain(..) {
                batch.absorb(group.batch);
            }
            batch.absorb(Batch::new(vec![change]));
            return Some(batch);
        }

        let dir = change.package_dir().to_path_buf();
        let deadline = now + self.quiet_period;
        match self.groups.iter_mut().find(|g| g.dir == dir) {
            Some(group) => {
                group.batch.absorb(Batch::new(vec![change]));
                group.deadline = deadline;
            }
            None => self.groups.push(PendingGroup {
                dir,
                batch: Batch::new(vec![change]),
                deadline,
            }),
        }
        None
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups.iter().map(|g| g.deadline).min()
    }

    /// Remove and return every group whose quiet period has elapsed
    pub fn take_due(&mut self, now: Instant) -> Vec<Batch> {
        let (mut due, rest): (Vec<_>, Vec<_>) =
            self.groups.drain(..).partition(|g| g.deadline <= now);
        self.groups = rest;
        due.sort_by_key(|g| g.deadline);
        due.into_iter().map(|g| g.batch).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of changes waiting in pending groups
    pub fn pending_changes(&self) -> usize {
        self.groups.iter().map(|g| g.batch.len()).sum()
    }

    /// Drop every pending group, returning how many changes were lost
    pub fn discard(&mut self) -> usize {
        let count = self.pending_changes();
        self.groups.clear();
        count
    }
}

/// Background debouncer
///
/// The worker thread owns the batch sender; the receiver returned by
/// [`Debouncer::start`] disconnects once the worker has exited.
pub struct Debouncer {
    input: Option<channel::Sender<FileChange>>,
    stop: Option<channel::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl Debouncer {
    pub fn start(quiet_period: Duration) -> (Self, channel::Receiver<Batch>) {
        let (input_tx, input_rx) = channel::unbounded();
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let (batch_tx, batch_rx) = channel::unbounded();

        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let worker = thread::spawn(move || {
            run_worker(quiet_period, input_rx, stop_rx, batch_tx, worker_pending)
        });

        (
            Self {
                input: Some(input_tx),
                stop: Some(stop_tx),
                worker: Some(worker),
                pending,
            },
            batch_rx,
        )
    }

    /// Queue a change. Returns false once the debouncer has stopped.
    pub fn feed(&self, change: FileChange) -> bool {
        self.input
            .as_ref()
            .is_some_and(|tx| tx.send(change).is_ok())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Whether changes are queued or waiting out their quiet period
    pub fn has_pending(&self) -> bool {
        self.input.as_ref().is_some_and(|tx| !tx.is_empty())
            || self.pending.load(Ordering::SeqCst) > 0
    }

    /// Stop the worker and wait for it; pending groups are discarded
    pub fn stop(&mut self) {
        drop(self.stop.take());
        drop(self.input.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("debounce worker panicked");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    quiet_period: Duration,
    input: channel::Receiver<FileChange>,
    stop: channel::Receiver<()>,
    batches: channel::Sender<Batch>,
    pending: Arc<AtomicUsize>,
) {
    let mut state = DebounceState::new(quiet_period);

    'run: loop {
        let timer = match state.next_deadline() {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        };

        let mut ready = Vec::new();
        channel::select! {
            recv(stop) -> _ => break 'run,
            recv(input) -> msg => match msg {
                Ok(change) => ready.extend(state.add(change, Instant::now())),
                Err(_) => break 'run,
            },
            recv(timer) -> _ => {}
        }
        ready.extend(state.take_due(Instant::now()));
        pending.store(state.pending_changes(), Ordering::SeqCst);

        for batch in ready {
            tracing::debug!("flushing batch of {} change(s)", batch.len());
            if batches.send(batch).is_err() {
                break 'run;
            }
        }
    }

    let discarded = state.discard();
    pending.store(0, Ordering::SeqCst);
    if discarded > 0 {
        tracing::debug!("discarded {discarded} pending change(s) on stop");
    }
    drop(batches);
}
