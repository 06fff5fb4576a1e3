//! Change analyzer - turns a settled batch into the minimal stale set

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cache::ResultCache;
use super::discovery::{declared_tests, dependency_paths, discover_test_packages};
use crate::domain::policies::{classify, is_test_file, WatchMode};
use crate::domain::value_objects::{
    package_id, Batch, ChangeKind, FileChange, IgnorePatterns, TestKey, TestTarget, ROOT_PACKAGE,
};

/// Tests and targets that must re-run for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleSet {
    /// Known tests whose cached results can no longer be trusted
    pub tests: BTreeSet<TestKey>,
    /// Targets to execute, one per package, ordered by package
    pub targets: Vec<TestTarget>,
    /// Every cached entry must be discarded
    pub full: bool,
}

impl StaleSet {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.tests.is_empty()
    }
}

/// Computes stale sets from file changes
pub struct ChangeAnalyzer {
    root: PathBuf,
    mode: WatchMode,
    ignore: IgnorePatterns,
    cache: Arc<ResultCache>,
}

impl ChangeAnalyzer {
    pub fn new(
        root: impl Into<PathBuf>,
        mode: WatchMode,
        ignore: IgnorePatterns,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            root: root.into(),
            mode,
            ignore,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Classify a path (pure)
    pub fn classify(path: &Path) -> ChangeKind {
        classify(path)
    }

    /// Directory of a package id
    pub fn package_dir(&self, package: &str) -> PathBuf {
        if package == ROOT_PACKAGE {
            self.root.clone()
        } else {
            self.root.join(package)
        }
    }

    /// Files the results of `target` depend on
    pub fn dependency_paths(&self, target: &TestTarget) -> Vec<PathBuf> {
        dependency_paths(&self.root, &target.dir)
    }

    /// Every package known to have tests, as whole-package targets.
    ///
    /// Union of the packages in the cache index and the packages found on
    /// disk; indexed packages whose test files are gone are dropped.
    pub fn known_targets(&self) -> Vec<TestTarget> {
        let mut packages = discover_test_packages(&self.root, &self.ignore);
        for package in self.cache.known_packages() {
            let dir = self.package_dir(&package);
            if has_test_files(&dir) {
                packages.entry(package).or_insert(dir);
            }
        }
        packages
            .into_iter()
            .map(|(package, dir)| TestTarget::package(package, dir))
            .collect()
    }

    /// Compute the stale set for a settled batch
    pub fn analyze(&self, batch: &Batch) -> StaleSet {
        if batch.is_empty() {
            return StaleSet::default();
        }
        if self.mode == WatchMode::All || batch.has_global_change() {
            return self.full_stale_set();
        }

        let mut tests = BTreeSet::new();
        let mut targets: BTreeMap<String, TestTarget> = BTreeMap::new();
        for change in &batch.changes {
            let (stale, candidates) = match change.kind {
                ChangeKind::Test => self.analyze_test_change(change),
                _ => self.analyze_source_change(change),
            };
            tests.extend(stale);
            for target in candidates {
                if !has_test_files(&target.dir) {
                    tracing::debug!("no test files left in {}, skipping", target.package);
                    continue;
                }
                match targets.get_mut(&target.package) {
                    Some(existing) => existing.merge(target),
                    None => {
                        targets.insert(target.package.clone(), target);
                    }
                }
            }
        }

        StaleSet {
            tests,
            targets: targets.into_values().collect(),
            full: false,
        }
    }

    fn full_stale_set(&self) -> StaleSet {
        let targets = self.known_targets();
        let mut tests = BTreeSet::new();
        for package in self.cache.known_packages() {
            for name in self.cache.known_tests(&package) {
                tests.insert(TestKey::new(package.clone(), name));
            }
        }
        StaleSet {
            tests,
            targets,
            full: true,
        }
    }

    /// Exactly the tests declared in the changed file
    fn analyze_test_change(&self, change: &FileChange) -> (BTreeSet<TestKey>, Vec<TestTarget>) {
        let dir = change.package_dir().to_path_buf();
        let package = package_id(&self.root, &dir);
        let known = self.cache.known_tests(&package);

        match declared_tests(&change.path) {
            Some(names) if !names.is_empty() => {
                let mut stale = BTreeSet::new();
                for name in &names {
                    stale.insert(TestKey::new(package.clone(), name.clone()));
                    let prefix = format!("{name}/");
                    for known_name in known.iter().filter(|k| k.starts_with(&prefix)) {
                        stale.insert(TestKey::new(package.clone(), known_name.clone()));
                    }
                }
                (stale, vec![TestTarget::tests(package, dir, names)])
            }
            _ => {
                // Deleted, unreadable or declaration-free: the whole package is suspect
                let stale = known
                    .into_iter()
                    .map(|name| TestKey::new(package.clone(), name))
                    .collect();
                (stale, vec![TestTarget::package(package, dir)])
            }
        }
    }

    /// Indexed dependents plus the containing package
    fn analyze_source_change(&self, change: &FileChange) -> (BTreeSet<TestKey>, Vec<TestTarget>) {
        let dir = change.package_dir().to_path_buf();
        let package = package_id(&self.root, &dir);
        let dependents = self.cache.dependents(&change.path);

        let mut stale: BTreeSet<TestKey> = dependents.clone();
        stale.extend(
            self.cache
                .known_tests(&package)
                .into_iter()
                .map(|name| TestKey::new(package.clone(), name)),
        );

        let mut targets = Vec::new();
        if self.mode == WatchMode::Related && !dependents.is_empty() {
            let mut by_package: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for key in &dependents {
                by_package
                    .entry(key.package.clone())
                    .or_default()
                    .insert(key.root_name().to_string());
            }
            for (pkg, names) in by_package {
                let pkg_dir = self.package_dir(&pkg);
                targets.push(TestTarget::tests(pkg, pkg_dir, names));
            }
        } else {
            targets.push(TestTarget::package(package.clone(), dir));
            let others: BTreeSet<&str> = dependents
                .iter()
                .map(|k| k.package.as_str())
                .filter(|p| *p != package)
                .collect();
            for pkg in others {
                targets.push(TestTarget::package(pkg, self.package_dir(pkg)));
            }
        }

        (stale, targets)
    }
}

/// Whether a directory directly contains a Go test file
pub fn has_test_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| is_test_file(&e.path()) && e.file_type().is_ok_and(|ft| ft.is_file()))
        })
        .unwrap_or(false)
}
