//! Scenario: Watch Session
//!
//! Journey: a developer starts `sentinel watch`, saves files in bursts the
//! way editors do, and expects one run per settled burst.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use sentinel::domain::ports::CollectingSink;
use sentinel::domain::value_objects::{ChangeKind, FileChange};
use sentinel::{
    EngineConfig, ExecutionScheduler, ResultCache, RunTrigger, SchedulerOptions, WatchCoordinator,
    WatchState,
};

use crate::common::*;

fn coordinator(project: &GoProject, config: EngineConfig) -> (WatchCoordinator, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let scheduler = ExecutionScheduler::new(
        ScriptedGo::new(project.root()),
        SchedulerOptions::default(),
    );
    let coordinator = WatchCoordinator::new(
        config,
        Arc::new(ResultCache::new()),
        Arc::new(scheduler),
        sink.clone(),
    );
    (coordinator, sink)
}

fn config(project: &GoProject) -> EngineConfig {
    EngineConfig::new(project.root())
        .with_quiet_period(Duration::from_millis(100))
        .with_run_on_start(false)
        .with_cache_path(None)
}

/// SCENARIO C: five saves inside the quiet period produce one run
#[test]
fn scenario_burst_of_saves_is_one_run() {
    let project = GoProject::new();
    let (mut coordinator, sink) = coordinator(&project, config(&project));
    let (tx, rx) = channel::unbounded();
    coordinator.start_with_changes(rx).unwrap();

    let path = project.path("internal/config/loader.go");
    for _ in 0..5 {
        tx.send(FileChange::new(path.clone(), ChangeKind::Source))
            .unwrap();
        thread::sleep(Duration::from_millis(10));
    }

    assert!(eventually(|| sink.reports().len() == 1));
    // Well past another quiet period: nothing else fires
    thread::sleep(Duration::from_millis(300));
    coordinator.stop();

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].trigger, RunTrigger::Changes(vec![path]));
    let executing = sink
        .states()
        .into_iter()
        .filter(|s| *s == WatchState::Executing)
        .count();
    assert_eq!(executing, 1);
}

/// Saves made while tests run are held for exactly one follow-up run
#[test]
fn scenario_changes_during_run_are_buffered() {
    let project = GoProject::new();
    project.write("internal/ui/slow", "");
    let (mut coordinator, sink) = coordinator(&project, config(&project));
    let (tx, rx) = channel::unbounded();
    coordinator.start_with_changes(rx).unwrap();

    let render = project.path("internal/ui/render.go");
    let loader = project.path("internal/config/loader.go");
    tx.send(FileChange::new(render.clone(), ChangeKind::Source))
        .unwrap();
    assert!(eventually(|| coordinator.state() == WatchState::Executing));

    tx.send(FileChange::new(loader.clone(), ChangeKind::Source))
        .unwrap();
    tx.send(FileChange::new(render.clone(), ChangeKind::Source))
        .unwrap();

    assert!(eventually(|| sink.reports().len() == 2));
    thread::sleep(Duration::from_millis(300));
    coordinator.stop();

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].trigger, RunTrigger::Changes(vec![render.clone()]));
    let RunTrigger::Changes(paths) = &reports[1].trigger else {
        panic!("follow-up run should be change-triggered");
    };
    assert_eq!(
        paths.iter().cloned().collect::<BTreeSet<PathBuf>>(),
        BTreeSet::from([loader, render])
    );
    let packages: BTreeSet<&str> = reports[1]
        .result
        .results()
        .map(|r| r.package.as_str())
        .collect();
    assert_eq!(packages, BTreeSet::from(["internal/config", "internal/ui"]));

    // The follow-up starts only after the first process has exited
    let log = project.go_log();
    assert_eq!(log.len(), 6);
    assert_eq!(log[..2], ["start ./internal/ui", "end ./internal/ui"]);

    assert_eq!(
        sink.states(),
        vec![
            WatchState::Watching,
            WatchState::Debouncing,
            WatchState::Executing,
            WatchState::Publishing,
            WatchState::Debouncing,
            WatchState::Executing,
            WatchState::Publishing,
            WatchState::Watching,
            WatchState::Idle,
        ]
    );
}

/// Edits on disk reach the engine through the filesystem watcher
#[test]
fn scenario_saved_file_triggers_run() {
    let project = GoProject::new();
    let (mut coordinator, sink) = coordinator(&project, config(&project));
    coordinator.start().unwrap();

    project.write("internal/ui/render.go", "package ui\n\nvar theme = \"dark\"\n");

    assert!(eventually(|| !sink.reports().is_empty()));
    coordinator.stop();

    let report = &sink.reports()[0];
    assert!(report.result.results().all(|r| r.package == "internal/ui"));
    assert!(report.result.results().any(|r| r.name == "TestRender"));
    assert_eq!(project.invocations(), vec!["./internal/ui"]);
}

/// Startup run, then Ctrl+C through the stop handle
#[test]
fn scenario_startup_run_then_interrupt() {
    let project = GoProject::new();
    let (mut coordinator, sink) =
        coordinator(&project, config(&project).with_run_on_start(true));
    let (_tx, rx) = channel::unbounded();
    coordinator.start_with_changes(rx).unwrap();

    assert!(eventually(|| sink.reports().len() == 1));
    assert_eq!(sink.reports()[0].trigger, RunTrigger::Startup);
    assert_eq!(sink.reports()[0].result.total(), 3);

    let handle = coordinator.stop_handle().unwrap();
    let waiter = thread::spawn(move || {
        coordinator.wait();
        coordinator
    });
    handle.stop();
    let coordinator = waiter.join().unwrap();

    assert!(!coordinator.is_running());
    assert_eq!(coordinator.state(), WatchState::Idle);
}
