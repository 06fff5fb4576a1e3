//! Property tests for decoding `go test -json` streams.

use proptest::prelude::*;

use sentinel::application::StreamProcessor;
use sentinel::domain::entities::{ExecutionResult, TestStatus};

fn status() -> impl Strategy<Value = TestStatus> {
    prop_oneof![
        Just(TestStatus::Passed),
        Just(TestStatus::Failed),
        Just(TestStatus::Skipped),
    ]
}

fn action(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "pass",
        TestStatus::Failed => "fail",
        TestStatus::Skipped => "skip",
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: totals always equal passed + failed + skipped, one result per test.
    #[test]
    fn property_counts_add_up(
        packages in proptest::collection::vec(
            proptest::collection::vec(status(), 0..12),
            1..4,
        )
    ) {
        let mut result = ExecutionResult::new();
        let mut expected = 0;
        for (pkg, statuses) in packages.iter().enumerate() {
            let mut processor = StreamProcessor::new(format!("pkg{pkg}"), std::env::temp_dir(), 0);
            for (idx, status) in statuses.iter().enumerate() {
                processor.feed(&format!(r#"{{"Action":"run","Test":"Test{idx}"}}"#));
                processor.feed(&format!(
                    r#"{{"Action":"{}","Test":"Test{idx}","Elapsed":0.01}}"#,
                    action(*status)
                ));
            }
            processor.feed(r#"{"Action":"pass","Elapsed":0.1}"#);
            result.add_suite(processor.finalize());
            expected += statuses.len();
        }

        prop_assert_eq!(result.total(), expected);
        prop_assert_eq!(result.total(), result.passed() + result.failed() + result.skipped());
        let failed = packages.iter().flatten().filter(|s| **s == TestStatus::Failed).count();
        prop_assert_eq!(result.failed(), failed);
        prop_assert_eq!(result.has_failures(), failed > 0);
    }

    /// PROPERTY: arbitrary input lines never panic and counts stay consistent.
    #[test]
    fn property_garbage_lines_never_panic(
        lines in proptest::collection::vec("(?s).{0,120}", 0..20)
    ) {
        let mut processor = StreamProcessor::new("pkg", std::env::temp_dir(), 3);
        for line in &lines {
            processor.feed(line);
        }
        prop_assert!(processor.parse_errors() <= lines.len());
        let suite = processor.finalize();
        prop_assert_eq!(suite.len(), suite.passed() + suite.failed() + suite.skipped());
    }
}
