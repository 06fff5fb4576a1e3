//! Result cache and dependency index
//!
//! One explicit instance per session, shared through `Arc`. Entries and the
//! index live behind a single `RwLock`; counters are atomics so `stats()`
//! never waits for a writer. Fingerprinting (file I/O) happens outside the
//! lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::entities::CachedResult;
use crate::domain::ports::CacheStats;
use crate::domain::value_objects::{Fingerprint, TestKey, TestTarget};

/// File → dependent tests, plus package → known test names
///
/// Grows as results are cached; only `clear()` shrinks it.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    dependents: HashMap<PathBuf, BTreeSet<TestKey>>,
    packages: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    fn record(&mut self, entry: &CachedResult) {
        for path in entry.dependencies.keys() {
            self.dependents
                .entry(path.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.packages
            .entry(entry.key.package.clone())
            .or_default()
            .insert(entry.key.name.clone());
    }

    pub fn dependents(&self, path: &Path) -> BTreeSet<TestKey> {
        self.dependents.get(path).cloned().unwrap_or_default()
    }

    pub fn packages(&self) -> BTreeSet<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn tests(&self, package: &str) -> BTreeSet<String> {
        self.packages.get(package).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TestKey, CachedResult>,
    index: DependencyIndex,
}

/// Session-wide cache of test results keyed by `TestKey`
#[derive(Debug, Default)]
pub struct ResultCache {
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from previously persisted entries (index rebuilt)
    pub fn from_entries(entries: impl IntoIterator<Item = CachedResult>) -> Self {
        let cache = Self::new();
        {
            let mut state = cache.write();
            for entry in entries {
                state.index.record(&entry);
                state.entries.insert(entry.key.clone(), entry);
            }
        }
        cache
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up one test, validating its fingerprints.
    ///
    /// Counts a hit or a miss; an invalid entry is evicted.
    pub fn get(&self, key: &TestKey) -> Option<CachedResult> {
        let entry = self.read().entries.get(key).cloned();
        let Some(entry) = entry else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.is_valid() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(entry)
        } else {
            self.evict_stale(std::slice::from_ref(&entry));
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Look up every cached result a target would produce.
    ///
    /// Counts one hit or one miss for the whole target. A whole-package
    /// target needs an entry for every test the index knows in that package;
    /// a named target needs an entry for every named test (its subtests come
    /// along).
    pub fn lookup_target(&self, target: &TestTarget) -> Option<Vec<CachedResult>> {
        let (candidates, required) = {
            let state = self.read();
            let mut found: Vec<CachedResult> = state
                .entries
                .values()
                .filter(|e| e.key.package == target.package && target.selects(&e.key.name))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.key.cmp(&b.key));
            let required: BTreeSet<String> = if target.is_whole_package() {
                state.index.tests(&target.package)
            } else {
                target.test_names.iter().cloned().collect()
            };
            (found, required)
        };

        let complete = !required.is_empty()
            && required
                .iter()
                .all(|name| candidates.iter().any(|e| &e.key.name == name));
        if !complete {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Entries of one package share most dependencies; hash each file once.
        let mut current: HashMap<&Path, Fingerprint> = HashMap::new();
        let mut stale: Vec<CachedResult> = Vec::new();
        for entry in &candidates {
            let valid = entry.dependencies.iter().all(|(path, recorded)| {
                let fingerprint = current
                    .entry(path.as_path())
                    .or_insert_with(|| Fingerprint::of_file(path));
                *fingerprint == *recorded
            });
            if !valid {
                stale.push(entry.clone());
            }
        }

        if stale.is_empty() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(candidates)
        } else {
            self.evict_stale(&stale);
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Remove entries that failed validation, unless they were replaced meanwhile
    fn evict_stale(&self, stale: &[CachedResult]) {
        let mut state = self.write();
        let mut evicted = 0;
        for entry in stale {
            if state.entries.get(&entry.key) == Some(entry) {
                state.entries.remove(&entry.key);
                evicted += 1;
            }
        }
        drop(state);
        if evicted > 0 {
            tracing::debug!("evicted {} stale cache entries", evicted);
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    pub fn put(&self, key: TestKey, mut result: CachedResult) {
        result.key = key.clone();
        let mut state = self.write();
        state.index.record(&result);
        state.entries.insert(key, result);
    }

    /// Forget tests of `package` that a complete run no longer reported
    ///
    /// Returns how many names left the index.
    pub fn retain_tests(&self, package: &str, reported: &BTreeSet<String>) -> usize {
        let mut state = self.write();
        let state = &mut *state;
        let Some(names) = state.index.packages.get_mut(package) else {
            return 0;
        };
        let gone: Vec<String> = names.difference(reported).cloned().collect();
        for name in &gone {
            names.remove(name);
            let key = TestKey::new(package, name.as_str());
            state.entries.remove(&key);
            for dependents in state.index.dependents.values_mut() {
                dependents.remove(&key);
            }
        }
        gone.len()
    }

    /// Evict every entry depending on one of `paths`; returns the evicted keys
    pub fn invalidate<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<TestKey> {
        let mut state = self.write();
        let mut affected: BTreeSet<TestKey> = BTreeSet::new();
        for path in paths {
            affected.extend(state.index.dependents(path.as_ref()));
        }

        let evicted: Vec<TestKey> = affected
            .into_iter()
            .filter(|key| state.entries.remove(key).is_some())
            .collect();
        drop(state);

        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        evicted
    }

    /// Evict every entry, keeping the index; returns how many were evicted
    pub fn invalidate_all(&self) -> usize {
        let mut state = self.write();
        let count = state.entries.len();
        state.entries.clear();
        drop(state);

        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Drop entries and index without counting evictions
    pub fn clear(&self) {
        let mut state = self.write();
        state.entries.clear();
        state.index = DependencyIndex::default();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn known_packages(&self) -> BTreeSet<String> {
        self.read().index.packages()
    }

    pub fn known_tests(&self, package: &str) -> BTreeSet<String> {
        self.read().index.tests(package)
    }

    pub fn dependents(&self, path: &Path) -> BTreeSet<TestKey> {
        self.read().index.dependents(path)
    }

    /// Copy of every entry, sorted by key, for persistence
    pub fn entries(&self) -> Vec<CachedResult> {
        let mut entries: Vec<CachedResult> = self.read().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}
