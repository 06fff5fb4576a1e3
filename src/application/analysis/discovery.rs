//! Package and test discovery on disk

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ignore::WalkBuilder;
use regex::Regex;

use crate::domain::policies::{is_go_file, is_test_file};
use crate::domain::value_objects::{package_id, IgnorePatterns};

/// Top-level test, example and fuzz declarations
static TEST_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+((?:Test|Example|Fuzz)[A-Za-z0-9_]*)\s*\(")
        .expect("test declaration regex is valid")
});

/// Find every package under `root` that contains at least one test file.
///
/// Returns package id → absolute directory. Hidden directories, `_`-prefixed
/// directories, `testdata` and ignored paths are skipped, as `go test ./...`
/// does.
pub fn discover_test_packages(root: &Path, ignore: &IgnorePatterns) -> BTreeMap<String, PathBuf> {
    let mut packages = BTreeMap::new();
    let filter_ignore = ignore.clone();
    let filter_root = root.to_path_buf();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let path = entry.path();
            if path == filter_root {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if is_dir && is_skipped_dir_name(&entry.file_name().to_string_lossy()) {
                return false;
            }
            !filter_ignore.is_ignored(path, is_dir)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("skipping unreadable entry during discovery: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) || !is_test_file(entry.path()) {
            continue;
        }
        if let Some(dir) = entry.path().parent() {
            packages
                .entry(package_id(root, dir))
                .or_insert_with(|| dir.to_path_buf());
        }
    }

    packages
}

fn is_skipped_dir_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || name == "testdata"
}

/// Names of the tests declared in a Go test file, in declaration order.
///
/// `None` when the file cannot be read (deleted, permission denied).
pub fn declared_tests(path: &Path) -> Option<Vec<String>> {
    let content = fs::read_to_string(path).ok()?;
    Some(parse_declared_tests(&content))
}

pub fn parse_declared_tests(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in TEST_DECL_RE.captures_iter(source) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Files whose content a package's test results depend on.
///
/// Every `.go` file directly in the package directory plus the module's
/// `go.mod`/`go.sum` when present. Sorted for stable fingerprints.
pub fn dependency_paths(root: &Path, dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
            .map(|e| e.path())
            .filter(|p| is_go_file(p))
            .collect(),
        Err(e) => {
            tracing::debug!("cannot list {}: {}", dir.display(), e);
            Vec::new()
        }
    };

    for manifest in ["go.mod", "go.sum"] {
        let path = root.join(manifest);
        if path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    paths.dedup();
    paths
}
