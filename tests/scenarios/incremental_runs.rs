//! Scenario: Incremental Runs
//!
//! Journey: a developer edits files between runs and expects only the
//! affected tests to execute, with everything else answered from the cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use sentinel::application::TestCycle;
use sentinel::domain::entities::TestStatus;
use sentinel::domain::value_objects::{Batch, FileChange, IgnorePatterns, TestKey};
use sentinel::{
    CancelToken, ChangeAnalyzer, ExecutionScheduler, ResultCache, RunTrigger, SchedulerOptions,
    WatchMode,
};

use crate::common::*;

fn cycle(project: &GoProject, max_concurrency: usize) -> TestCycle {
    let cache = Arc::new(ResultCache::new());
    let analyzer = ChangeAnalyzer::new(
        project.root(),
        WatchMode::Package,
        IgnorePatterns::empty(),
        Arc::clone(&cache),
    );
    let scheduler = ExecutionScheduler::new(
        ScriptedGo::new(project.root()),
        SchedulerOptions::default(),
    );
    TestCycle::new(Arc::new(analyzer), cache, Arc::new(scheduler), max_concurrency)
}

fn change(project: &GoProject, rel: &str) -> Batch {
    let path = project.path(rel);
    let kind = ChangeAnalyzer::classify(&path);
    Batch::new(vec![FileChange::new(path, kind)])
}

/// SCENARIO A: editing a source file reruns exactly its package's tests
#[test]
fn scenario_source_edit_reruns_only_dependents() {
    let project = GoProject::new();
    let cycle = cycle(&project, 2);
    let cancel = CancelToken::new();

    let first = cycle.run_known(&cancel, RunTrigger::Startup);
    assert_eq!(first.result.total(), 3);
    assert_eq!(first.result.passed(), 3);
    assert_eq!(project.invocations().len(), 2);

    project.write("internal/config/loader.go", "package config\n\nvar x = 1\n");
    let batch = change(&project, "internal/config/loader.go");

    let stale = cycle.analyzer().analyze(&batch);
    let expected: BTreeSet<TestKey> = [
        TestKey::new("internal/config", "TestLoadConfig_ValidFile"),
        TestKey::new("internal/config", "TestLoadConfig_InvalidFile"),
    ]
    .into_iter()
    .collect();
    assert_eq!(stale.tests, expected);

    let second = cycle.run_batch(&cancel, &batch);
    assert_eq!(second.result.total(), 2);
    assert_eq!(second.result.invocations, 1);
    assert_eq!(
        project.invocations().last().map(String::as_str),
        Some("./internal/config")
    );

    // The unrelated package is still a cache hit
    let ui = cycle.cache().get(&TestKey::new("internal/ui", "TestRender"));
    assert_eq!(ui.map(|entry| entry.status), Some(TestStatus::Passed));
}

/// SCENARIO B: touching the module manifest drops the whole cache
#[test]
fn scenario_manifest_edit_reruns_everything() {
    let project = GoProject::new();
    let cycle = cycle(&project, 2);
    let cancel = CancelToken::new();

    cycle.run_known(&cancel, RunTrigger::Startup);
    let prior = cycle.cache().len();
    let before = cycle.cache().stats();
    assert_eq!(prior, 3);

    project.write("go.mod", "module example.com/app\n\ngo 1.23\n");
    let report = cycle.run_batch(&cancel, &change(&project, "go.mod"));

    assert_eq!(report.stats.evictions - before.evictions, prior as u64);
    assert_eq!(report.result.invocations, 2);
    assert_eq!(report.result.total(), 3);
    assert_eq!(cycle.cache().len(), 3);
}

/// SCENARIO D: an undecodable line does not lose the result that follows it
#[test]
fn scenario_malformed_output_line_is_skipped() {
    let project = GoProject::new();
    project.write("internal/ui/noisy", "");
    let cycle = cycle(&project, 2);

    let report = cycle.run_known(&CancelToken::new(), RunTrigger::Manual);

    assert_eq!(report.result.parse_errors, 1);
    let render = report
        .result
        .results()
        .find(|r| r.name == "TestRender")
        .unwrap();
    assert_eq!(render.status, TestStatus::Passed);
}

/// SCENARIO E: with one worker, the second process starts after the first exits
#[test]
fn scenario_single_worker_serializes_processes() {
    let project = GoProject::new();
    let cycle = cycle(&project, 1);

    cycle.run_known(&CancelToken::new(), RunTrigger::Manual);

    assert_eq!(
        project.go_log(),
        vec![
            "start ./internal/config",
            "end ./internal/config",
            "start ./internal/ui",
            "end ./internal/ui",
        ]
    );
}

/// A repeated run with nothing edited executes nothing
#[test]
fn scenario_unchanged_tree_is_served_from_cache() {
    let project = GoProject::new();
    let cycle = cycle(&project, 2);
    let cancel = CancelToken::new();

    let first = cycle.run_known(&cancel, RunTrigger::Startup);
    let second = cycle.run_known(&cancel, RunTrigger::Manual);

    assert_eq!(second.result.invocations, 0);
    assert_eq!(second.result.cached_targets, 2);
    assert_eq!(second.result.total(), first.result.total());
    assert_eq!(project.invocations().len(), 2);
}

/// Failures carry their location and the surrounding source
#[test]
fn scenario_failure_points_at_source() {
    let project = GoProject::new();
    project.write(
        "internal/ui/render_test.go",
        "package ui\n\nimport \"testing\"\n\nfunc TestRender_Fails(t *testing.T) {\n\tt.Fatal(\"boom\")\n}\n",
    );
    let cycle = cycle(&project, 2);

    let report = cycle.run_known(&CancelToken::new(), RunTrigger::Manual);

    assert!(report.result.has_failures());
    let failed = report
        .result
        .results()
        .find(|r| r.status == TestStatus::Failed)
        .unwrap();
    assert_eq!(failed.name, "TestRender_Fails");
    let error = failed.error.as_ref().unwrap();
    assert!(error.message.contains("boom"));
    let location = error.location.as_ref().unwrap();
    assert_eq!(location.line, 6);
    assert!(error
        .context_lines
        .iter()
        .any(|line| line.contains("t.Fatal")));

    // Failed tests are cached too; a rerun needs an edit
    assert!(cycle
        .cache()
        .get(&TestKey::new("internal/ui", "TestRender_Fails"))
        .is_some());
}

const EXTRA_TESTS: &str = "package config\n\nimport \"testing\"\n\nfunc TestExtra(t *testing.T) {}\n";

/// Editing one test file reruns its tests without hiding the package's others
#[test]
fn scenario_test_file_edit_keeps_sibling_tests_in_full_runs() {
    let project = GoProject::new();
    project.write("internal/config/extra_test.go", EXTRA_TESTS);
    let cycle = cycle(&project, 2);
    let cancel = CancelToken::new();

    let first = cycle.run_known(&cancel, RunTrigger::Startup);
    assert_eq!(first.result.total(), 4);

    project.write(
        "internal/config/extra_test.go",
        &format!("{EXTRA_TESTS}\n// edited\n"),
    );
    let second = cycle.run_batch(&cancel, &change(&project, "internal/config/extra_test.go"));
    assert_eq!(second.result.total(), 1);

    let third = cycle.run_known(&cancel, RunTrigger::Manual);
    assert_eq!(third.result.total(), 4);
    assert_eq!(third.result.invocations, 1);
    assert_eq!(third.result.cached_targets, 1);
    let names: BTreeSet<&str> = third.result.results().map(|r| r.name.as_str()).collect();
    assert!(names.contains("TestLoadConfig_ValidFile"));
    assert!(names.contains("TestLoadConfig_InvalidFile"));

    // Once the package is whole again it is served from the cache
    let fourth = cycle.run_known(&cancel, RunTrigger::Manual);
    assert_eq!(fourth.result.total(), 4);
    assert_eq!(fourth.result.invocations, 0);
}

/// A deleted test stops counting against the package's cache entry
#[test]
fn scenario_removed_test_is_forgotten_after_full_run() {
    let project = GoProject::new();
    project.write("internal/config/extra_test.go", EXTRA_TESTS);
    let cycle = cycle(&project, 2);
    let cancel = CancelToken::new();

    cycle.run_known(&cancel, RunTrigger::Startup);
    project.write("internal/config/extra_test.go", "package config\n");
    let rerun = cycle.run_known(&cancel, RunTrigger::Manual);
    assert_eq!(rerun.result.total(), 3);
    assert!(!cycle.cache().known_tests("internal/config").contains("TestExtra"));

    let cached = cycle.run_known(&cancel, RunTrigger::Manual);
    assert_eq!(cached.result.total(), 3);
    assert_eq!(cached.result.invocations, 0);
}
