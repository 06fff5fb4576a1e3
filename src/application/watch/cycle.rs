//! One analyze → invalidate → execute → cache pass

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::application::analysis::{ChangeAnalyzer, ResultCache};
use crate::application::cancel::CancelToken;
use crate::application::execution::ExecutionScheduler;
use crate::domain::entities::{CachedResult, ExecutionResult, TestSuite};
use crate::domain::ports::{RunReport, RunTrigger};
use crate::domain::value_objects::{Batch, Fingerprint, TestTarget};

/// A single test cycle over shared components
#[derive(Clone)]
pub struct TestCycle {
    analyzer: Arc<ChangeAnalyzer>,
    cache: Arc<ResultCache>,
    scheduler: Arc<ExecutionScheduler>,
    max_concurrency: usize,
}

impl TestCycle {
    pub fn new(
        analyzer: Arc<ChangeAnalyzer>,
        cache: Arc<ResultCache>,
        scheduler: Arc<ExecutionScheduler>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            analyzer,
            cache,
            scheduler,
            max_concurrency,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn analyzer(&self) -> &Arc<ChangeAnalyzer> {
        &self.analyzer
    }

    /// Run whatever a settled batch made stale
    pub fn run_batch(&self, cancel: &CancelToken, batch: &Batch) -> RunReport {
        let stale = self.analyzer.analyze(batch);
        if stale.full {
            let dropped = self.cache.invalidate_all();
            tracing::info!("global change, dropped {dropped} cached result(s)");
        } else {
            let paths: Vec<&std::path::Path> = batch.paths().collect();
            let evicted = self.cache.invalidate(&paths);
            tracing::debug!("invalidated {} cached result(s)", evicted.len());
        }
        tracing::debug!(
            "{} stale test(s) across {} target(s)",
            stale.tests.len(),
            stale.targets.len()
        );

        let trigger = RunTrigger::Changes(batch.paths().map(PathBuf::from).collect());
        self.run_targets(cancel, trigger, stale.targets)
    }

    /// Run every known target, answering from the cache where possible
    pub fn run_known(&self, cancel: &CancelToken, trigger: RunTrigger) -> RunReport {
        let targets = self.analyzer.known_targets();
        self.run_targets(cancel, trigger, targets)
    }

    fn run_targets(
        &self,
        cancel: &CancelToken,
        trigger: RunTrigger,
        targets: Vec<TestTarget>,
    ) -> RunReport {
        let started = Instant::now();
        let order: Vec<String> = targets.iter().map(|t| t.package.clone()).collect();

        let mut cached: HashMap<String, TestSuite> = HashMap::new();
        let mut pending = Vec::new();
        for target in targets {
            match self.cache.lookup_target(&target) {
                Some(entries) => {
                    let tests = entries.iter().map(CachedResult::to_result).collect();
                    let mut suite = TestSuite::from_tests(target.package.clone(), tests);
                    suite.duration = entries.iter().map(|e| e.duration).sum();
                    cached.insert(target.package.clone(), suite);
                }
                None => pending.push(target),
            }
        }

        // Fingerprints are taken before the run so edits made while tests
        // execute leave the new entries stale.
        let dependencies: HashMap<String, BTreeMap<PathBuf, Fingerprint>> = pending
            .iter()
            .map(|target| {
                let deps = self
                    .analyzer
                    .dependency_paths(target)
                    .into_iter()
                    .map(|path| {
                        let fingerprint = Fingerprint::of_file(&path);
                        (path, fingerprint)
                    })
                    .collect();
                (target.package.clone(), deps)
            })
            .collect();

        let whole_packages: Vec<String> = pending
            .iter()
            .filter(|t| t.is_whole_package())
            .map(|t| t.package.clone())
            .collect();

        let cached_targets = cached.len();
        tracing::info!(
            "running {} target(s), {} served from cache",
            pending.len(),
            cached_targets
        );

        let executed = self
            .scheduler
            .execute(cancel, pending, self.max_concurrency);
        self.store(&executed, &dependencies);
        self.prune(&executed, &whole_packages);

        let mut result = ExecutionResult::new();
        let mut fresh: HashMap<PathBuf, TestSuite> = executed
            .suites
            .into_iter()
            .map(|s| (s.file_path.clone(), s))
            .collect();
        for package in order {
            let suite = cached
                .remove(&package)
                .or_else(|| fresh.remove(&PathBuf::from(&package)));
            if let Some(suite) = suite {
                result.add_suite(suite);
            }
        }
        result.invocations = executed.invocations;
        result.parse_errors = executed.parse_errors;
        result.cached_targets = cached_targets;
        result.duration = started.elapsed();

        RunReport {
            trigger,
            result,
            stats: self.cache.stats(),
        }
    }

    fn store(
        &self,
        executed: &ExecutionResult,
        dependencies: &HashMap<String, BTreeMap<PathBuf, Fingerprint>>,
    ) {
        let mut stored = 0;
        for result in executed.results() {
            if result.is_synthetic() {
                continue;
            }
            let Some(deps) = dependencies.get(&result.package) else {
                continue;
            };
            self.cache
                .put(result.key(), CachedResult::from_result(result, deps.clone()));
            stored += 1;
        }
        tracing::debug!("cached {stored} result(s)");
    }

    /// Drop index names a clean whole-package run did not report
    fn prune(&self, executed: &ExecutionResult, whole_packages: &[String]) {
        for suite in &executed.suites {
            let package = suite.file_path.to_string_lossy().into_owned();
            if !whole_packages.contains(&package) {
                continue;
            }
            if suite.tests().iter().any(|t| t.is_synthetic()) {
                continue;
            }
            let reported: BTreeSet<String> = suite.tests().iter().map(|t| t.name.clone()).collect();
            let removed = self.cache.retain_tests(&package, &reported);
            if removed > 0 {
                tracing::debug!("forgot {removed} removed test(s) in {package}");
            }
        }
    }
}
