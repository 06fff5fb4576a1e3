//! Change Classification Policy
//!
//! Maps a path to a `ChangeKind` from its file name alone.

use std::path::Path;

use crate::domain::value_objects::ChangeKind;

/// Module manifest and checksum files
pub const DEPENDENCY_FILES: &[&str] = &["go.mod", "go.sum", "go.work", "go.work.sum"];

/// Tool configuration files that can change the outcome of any test
pub const CONFIG_FILES: &[&str] = &[
    ".golangci.yml",
    ".golangci.yaml",
    ".golangci.toml",
    ".golangci.json",
    "sentinel.toml",
    ".sentinel.toml",
];

/// Suffix of Go test files
pub const TEST_FILE_SUFFIX: &str = "_test.go";

/// Classify a changed path.
///
/// Test files win over everything else, then dependency manifests, then
/// configuration; all remaining paths are source.
pub fn classify(path: &Path) -> ChangeKind {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return ChangeKind::Source,
    };

    if is_test_file(path) {
        ChangeKind::Test
    } else if DEPENDENCY_FILES.contains(&name) {
        ChangeKind::Dependency
    } else if CONFIG_FILES.contains(&name) {
        ChangeKind::Config
    } else {
        ChangeKind::Source
    }
}

pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEST_FILE_SUFFIX) && n.len() > TEST_FILE_SUFFIX.len())
}

pub fn is_go_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "go")
}

/// Whether a change to `path` can affect any test outcome
pub fn is_relevant(path: &Path) -> bool {
    is_go_file(path) || classify(path).is_global()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files() {
        assert_eq!(classify(Path::new("pkg/config/loader_test.go")), ChangeKind::Test);
        assert_eq!(classify(Path::new("/abs/main_test.go")), ChangeKind::Test);
    }

    #[test]
    fn dependency_files() {
        for name in DEPENDENCY_FILES {
            assert_eq!(classify(Path::new(name)), ChangeKind::Dependency, "{name}");
        }
        assert_eq!(classify(Path::new("tools/go.mod")), ChangeKind::Dependency);
    }

    #[test]
    fn config_files() {
        assert_eq!(classify(Path::new(".golangci.yml")), ChangeKind::Config);
        assert_eq!(classify(Path::new(".sentinel.toml")), ChangeKind::Config);
    }

    #[test]
    fn everything_else_is_source() {
        assert_eq!(classify(Path::new("pkg/config/loader.go")), ChangeKind::Source);
        assert_eq!(classify(Path::new("README.md")), ChangeKind::Source);
        assert_eq!(classify(Path::new("testdata/input.json")), ChangeKind::Source);
        assert_eq!(classify(Path::new("_test.go")), ChangeKind::Source);
    }

    #[test]
    fn relevance() {
        assert!(is_relevant(Path::new("pkg/loader.go")));
        assert!(is_relevant(Path::new("go.sum")));
        assert!(is_relevant(Path::new(".golangci.yml")));
        assert!(!is_relevant(Path::new("README.md")));
        assert!(!is_relevant(Path::new("pkg/testdata/input.json")));
    }
}
