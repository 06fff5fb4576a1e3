//! Property tests for change coalescing.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use sentinel::application::watch::DebounceState;
use sentinel::domain::value_objects::{Batch, ChangeKind, FileChange};

const QUIET: Duration = Duration::from_millis(100);

fn change() -> impl Strategy<Value = FileChange> {
    prop_oneof![
        8 => (0..3usize, 0..4usize).prop_map(|(dir, file)| {
            FileChange::new(format!("/repo/pkg{dir}/file{file}.go"), ChangeKind::Source)
        }),
        2 => (0..3usize).prop_map(|dir| {
            FileChange::new(format!("/repo/pkg{dir}/pkg_test.go"), ChangeKind::Test)
        }),
        1 => Just(FileChange::new("/repo/go.sum", ChangeKind::Dependency)),
    ]
}

/// Feed changes with the given gaps, then let every group settle
fn run(steps: &[(FileChange, u64)]) -> Vec<Batch> {
    let mut state = DebounceState::new(QUIET);
    let mut now = Instant::now();
    let mut batches = Vec::new();
    for (change, gap_ms) in steps {
        now += Duration::from_millis(*gap_ms);
        batches.extend(state.take_due(now));
        batches.extend(state.add(change.clone(), now));
    }
    batches.extend(state.take_due(now + QUIET));
    assert!(!state.has_pending());
    batches
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: every observed path is delivered, and a batch never repeats a path.
    #[test]
    fn property_batches_cover_inputs_without_duplicates(
        steps in proptest::collection::vec((change(), 0..150u64), 0..40)
    ) {
        let batches = run(&steps);

        let mut delivered = BTreeSet::new();
        for batch in &batches {
            prop_assert!(!batch.is_empty());
            let unique: BTreeSet<&PathBuf> = batch.changes.iter().map(|c| &c.path).collect();
            prop_assert_eq!(unique.len(), batch.len());
            delivered.extend(unique.into_iter().cloned());
        }

        let observed: BTreeSet<PathBuf> = steps.iter().map(|(c, _)| c.path.clone()).collect();
        prop_assert_eq!(delivered, observed);
    }

    /// PROPERTY: without a global change, a batch holds a single package directory.
    #[test]
    fn property_local_batches_stay_in_one_package(
        steps in proptest::collection::vec((change(), 0..150u64), 0..40)
    ) {
        for batch in run(&steps) {
            if batch.has_global_change() {
                continue;
            }
            let dirs: BTreeSet<_> = batch.changes.iter().map(|c| c.package_dir()).collect();
            prop_assert_eq!(dirs.len(), 1);
        }
    }

    /// PROPERTY: edits spaced inside the quiet period never split a package's batch.
    #[test]
    fn property_rapid_edits_coalesce(
        count in 1..20usize,
        gap in 0..100u64,
    ) {
        let steps: Vec<_> = (0..count)
            .map(|i| {
                let change = FileChange::new(format!("/repo/pkg/file{}.go", i % 3), ChangeKind::Source);
                (change, gap)
            })
            .collect();

        let batches = run(&steps);

        prop_assert_eq!(batches.len(), 1);
        prop_assert_eq!(batches[0].len(), count.min(3));
    }
}
