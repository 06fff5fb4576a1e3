//! Scenario: One-Shot CLI Runs
//!
//! Journey: CI calls `sentinel run --json` twice on the same checkout and
//! reads the NDJSON stream; a developer runs it by hand and reads the summary.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

use crate::common::*;

struct Cli {
    project: GoProject,
    home: TempDir,
    fake_go: std::path::PathBuf,
}

impl Cli {
    fn new() -> Self {
        let project = GoProject::new();
        let home = tempfile::tempdir().unwrap();
        let fake_go = project.install_fake_go(home.path());
        Self {
            project,
            home,
            fake_go,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_sentinel"))
            .args(args)
            .arg(self.project.root())
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path())
            .env("SENTINEL_GO_BINARY", &self.fake_go)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn events(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn summary(events: &[Value]) -> &Value {
    events
        .iter()
        .find(|e| e["event"] == "run_complete")
        .expect("run_complete event")
}

fn snapshot_exists(root: &Path) -> bool {
    root.join(".sentinel-cache.json").exists()
}

#[test]
fn scenario_json_run_reports_every_test() {
    let cli = Cli::new();

    let output = cli.run(&["run", "--json", "--no-cache"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let events = events(&output.stdout);
    let tests: Vec<&str> = events
        .iter()
        .filter(|e| e["event"] == "test")
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert_eq!(
        tests,
        vec!["TestLoadConfig_ValidFile", "TestLoadConfig_InvalidFile", "TestRender"]
    );
    let summary = summary(&events);
    assert_eq!(summary["status"], "success");
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["trigger"], "manual");
    assert!(!snapshot_exists(cli.project.root()));
}

/// Running twice on an unchanged tree answers the second run from the snapshot
#[test]
fn scenario_second_run_uses_snapshot() {
    let cli = Cli::new();

    let first = cli.run(&["run", "--json"]);
    assert!(first.status.success());
    assert!(snapshot_exists(cli.project.root()));

    let second = cli.run(&["run", "--json"]);
    assert!(second.status.success());
    let events = events(&second.stdout);
    let summary = summary(&events);
    assert_eq!(summary["invocations"], 0);
    assert_eq!(summary["cached_targets"], 2);
    assert_eq!(summary["passed"], 3);
    assert_eq!(cli.project.invocations().len(), 2);
}

#[test]
fn scenario_failing_test_sets_exit_code() {
    let cli = Cli::new();
    cli.project.write(
        "internal/config/loader_test.go",
        "package config\n\nimport \"testing\"\n\nfunc TestLoadConfig_Fails(t *testing.T) {\n\tt.Fatal(\"boom\")\n}\n",
    );

    let output = cli.run(&["run", "--no-cache"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL internal/config::TestLoadConfig_Fails"));
    assert!(stdout.contains("at loader_test.go:6"));
    assert!(stdout.contains("1 passed, 1 failed"));
}

#[test]
fn scenario_unknown_config_key_is_warned() {
    let cli = Cli::new();
    cli.project
        .write(".sentinel.toml", "max_concurency = 2\ncontext_lines = 1\n");

    let output = cli.run(&["run", "--no-cache"]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown key 'max_concurency'"));
    assert!(stderr.contains("did you mean 'max_concurrency'"));
}
