//! Test identity value objects

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identifier of the root package
pub const ROOT_PACKAGE: &str = ".";

/// Derive a package identifier from a directory under the watch root.
///
/// The identifier is the slash-separated relative path, `"."` for the root
/// itself. Directories outside the root keep their full path.
pub fn package_id(root: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(root).unwrap_or(dir);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ROOT_PACKAGE.to_string()
    } else {
        parts.join("/")
    }
}

/// Stable identity of one test: package plus `/`-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestKey {
    pub package: String,
    pub name: String,
}

impl TestKey {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Name of the top-level test this key belongs to
    pub fn root_name(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.package, self.name)
    }
}

/// Unit of work submitted to the scheduler
///
/// An empty `test_names` means the whole package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub package: String,
    pub dir: PathBuf,
    pub test_names: Vec<String>,
}

impl TestTarget {
    /// Target every test in a package
    pub fn package(package: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            dir: dir.into(),
            test_names: Vec::new(),
        }
    }

    /// Target specific tests in a package
    pub fn tests<I, S>(package: impl Into<String>, dir: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut target = Self::package(package, dir);
        for name in names {
            target.add_test(name.into());
        }
        target
    }

    pub fn is_whole_package(&self) -> bool {
        self.test_names.is_empty()
    }

    fn add_test(&mut self, name: String) {
        if !self.test_names.contains(&name) {
            self.test_names.push(name);
        }
    }

    /// Merge another target for the same package into this one.
    ///
    /// A whole-package target absorbs any named one.
    pub fn merge(&mut self, other: TestTarget) {
        debug_assert_eq!(self.package, other.package);
        if self.is_whole_package() {
            return;
        }
        if other.is_whole_package() {
            self.test_names.clear();
            return;
        }
        for name in other.test_names {
            self.add_test(name);
        }
    }

    /// Whether a test (possibly a subtest) is selected by this target
    pub fn selects(&self, name: &str) -> bool {
        if self.is_whole_package() {
            return true;
        }
        let root = name.split('/').next().unwrap_or(name);
        self.test_names.iter().any(|n| n == name || n == root)
    }

    /// Argument form of the package for `go test`
    pub fn package_arg(&self) -> String {
        if self.package == ROOT_PACKAGE {
            ".".to_string()
        } else {
            format!("./{}", self.package)
        }
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_package() {
            write!(f, "{}", self.package)
        } else {
            write!(f, "{} [{}]", self.package, self.test_names.join(", "))
        }
    }
}
