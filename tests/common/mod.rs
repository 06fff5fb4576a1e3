//! Shared fixtures for sentinel scenario and CLI tests.
//!
//! - `GoProject`: a throwaway Go module on disk
//! - `FAKE_GO`: a shell stand-in for `go test -json`
//! - `ScriptedGo`: a `TestCommand` that runs `FAKE_GO` in-process

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sentinel::domain::ports::TestCommand;
use sentinel::domain::value_objects::TestTarget;
use sentinel::GoTestCommand;
use tempfile::TempDir;

/// Shell stand-in for `go test -json [flags] [-run PATTERN] PKG`.
///
/// Reports every `func Test*` declared in the package's `_test.go` files
/// that matches the `-run` pattern. Tests whose name contains `Fails`
/// fail with a `file:line: boom` message; a `noisy` marker file in the
/// package makes it print one undecodable line first, and a `slow` marker
/// holds the process for a second. Each invocation is
/// logged to `.fake-go.log` in the working directory.
pub const FAKE_GO: &str = r#"pattern='.*'
while [ $# -gt 1 ]; do
  if [ "$1" = "-run" ]; then pattern="$2"; shift; fi
  shift
done
pkg="$1"
echo "start $pkg" >> .fake-go.log
[ -f "$pkg/noisy" ] && printf '{"Action":"pass","Test":\n'
[ -f "$pkg/slow" ] && sleep 1
status=pass
for file in "$pkg"/*_test.go; do
  [ -f "$file" ] || continue
  for name in $(sed -n 's/^func \(Test[A-Za-z0-9_]*\)(.*/\1/p' "$file"); do
    echo "$name" | grep -Eq "$pattern" || continue
    printf '{"Action":"run","Test":"%s"}\n' "$name"
    case "$name" in
    *Fails*)
      line=$(grep -n "^func $name(" "$file" | cut -d: -f1)
      printf '{"Action":"output","Test":"%s","Output":"    %s:%s: boom\\n"}\n' "$name" "$(basename "$file")" "$((line + 1))"
      printf '{"Action":"fail","Test":"%s","Elapsed":0.01}\n' "$name"
      status=fail
      ;;
    *)
      printf '{"Action":"pass","Test":"%s","Elapsed":0.01}\n' "$name"
      ;;
    esac
  done
done
sleep 0.05
echo "end $pkg" >> .fake-go.log
printf '{"Action":"%s","Elapsed":0.02}\n' "$status"
"#;

pub const CONFIG_TESTS: &str = r#"package config

import "testing"

func TestLoadConfig_ValidFile(t *testing.T) {}

func TestLoadConfig_InvalidFile(t *testing.T) {}
"#;

pub const UI_TESTS: &str = r#"package ui

import "testing"

func TestRender(t *testing.T) {}
"#;

/// A Go module with `internal/config` (two tests) and `internal/ui` (one test)
pub struct GoProject {
    _dir: TempDir,
    root: PathBuf,
}

impl GoProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let project = Self { _dir: dir, root };
        project.write("go.mod", "module example.com/app\n\ngo 1.22\n");
        project.write("internal/config/loader.go", "package config\n");
        project.write("internal/config/loader_test.go", CONFIG_TESTS);
        project.write("internal/ui/render.go", "package ui\n");
        project.write("internal/ui/render_test.go", UI_TESTS);
        project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, body: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    /// `start`/`end` lines written by `FAKE_GO`, in order
    pub fn go_log(&self) -> Vec<String> {
        fs::read_to_string(self.path(".fake-go.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Package arguments of every `FAKE_GO` invocation so far
    pub fn invocations(&self) -> Vec<String> {
        self.go_log()
            .into_iter()
            .filter_map(|line| line.strip_prefix("start ").map(str::to_string))
            .collect()
    }

    /// Install `FAKE_GO` as an executable file outside the module
    #[cfg(unix)]
    pub fn install_fake_go(&self, bin_dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = bin_dir.join("fake-go");
        fs::write(&path, format!("#!/bin/sh\n{FAKE_GO}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

/// Runs `FAKE_GO` through `sh -c` with the arguments `GoTestCommand` builds
pub struct ScriptedGo {
    go: GoTestCommand,
    root: PathBuf,
}

impl ScriptedGo {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            go: GoTestCommand::new("go", root),
            root: root.to_path_buf(),
        })
    }
}

impl TestCommand for ScriptedGo {
    fn command(&self, target: &TestTarget) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(FAKE_GO)
            .arg("go")
            .args(self.go.args(target))
            .current_dir(&self.root);
        cmd
    }
}

/// Poll `check` until it holds or ten seconds pass
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}
