//! CachedResult entity - a stored test outcome and what it depended on

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::test_result::{TestResult, TestStatus};
use crate::domain::value_objects::{Fingerprint, TestKey};

/// A cached test outcome
///
/// Valid only while every recorded dependency still has the recorded
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResult {
    pub key: TestKey,
    pub status: TestStatus,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Digest over `dependencies`
    pub fingerprint: Fingerprint,
    pub dependencies: BTreeMap<PathBuf, Fingerprint>,
    pub last_run_at: DateTime<Utc>,
}

impl CachedResult {
    pub fn new(
        key: TestKey,
        status: TestStatus,
        duration: Duration,
        dependencies: BTreeMap<PathBuf, Fingerprint>,
    ) -> Self {
        let fingerprint =
            Fingerprint::combine(dependencies.iter().map(|(p, f)| (p.as_path(), f)));
        Self {
            key,
            status,
            duration,
            fingerprint,
            dependencies,
            last_run_at: Utc::now(),
        }
    }

    /// Build an entry for a finished test from fingerprints captured before the run
    pub fn from_result(result: &TestResult, dependencies: BTreeMap<PathBuf, Fingerprint>) -> Self {
        Self::new(result.key(), result.status, result.duration, dependencies)
    }

    pub fn depends_on(&self, path: &Path) -> bool {
        self.dependencies.contains_key(path)
    }

    /// Re-fingerprint every dependency and compare
    pub fn is_valid(&self) -> bool {
        self.dependencies
            .iter()
            .all(|(path, recorded)| Fingerprint::of_file(path) == *recorded)
    }

    /// Rebuild a result for publishing a cache hit
    pub fn to_result(&self) -> TestResult {
        TestResult::new(self.key.package.clone(), self.key.name.clone(), self.status)
            .with_duration(self.duration)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
