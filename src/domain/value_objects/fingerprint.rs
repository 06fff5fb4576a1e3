//! Content Fingerprint Value Object
//!
//! Identifies the content of a file at a point in time. Used to decide
//! whether a cached test result is still valid.

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fingerprint of a file's content
///
/// Content hashes are preferred over modification times so that a no-op
/// touch (editor save without edits) never invalidates a cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fingerprint {
    /// SHA-256 of the content, stored with the `sha256:` prefix
    Content(String),
    /// The path did not exist (or could not be read) when fingerprinted
    Missing,
}

impl Fingerprint {
    /// Prefix for SHA-256 fingerprints
    pub const PREFIX: &'static str = "sha256:";

    const MISSING: &'static str = "missing";

    /// Fingerprint raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self::Content(format!("{}{:x}", Self::PREFIX, hash))
    }

    /// Fingerprint the current content of a file
    ///
    /// A file that no longer exists fingerprints as `Missing`, so deleting a
    /// dependency invalidates every result that recorded it.
    pub fn of_file(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::Missing,
            Err(e) => {
                tracing::debug!("cannot fingerprint {}: {}", path.display(), e);
                Self::Missing
            }
        }
    }

    /// Combine a set of per-file fingerprints into one digest
    ///
    /// Callers pass entries in a stable order (e.g. from a `BTreeMap`).
    pub fn combine<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a Path, &'a Fingerprint)>,
    {
        let mut hasher = Sha256::new();
        for (path, fingerprint) in entries {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(fingerprint.as_str().as_bytes());
            hasher.update([b'\n']);
        }
        Self::Content(format!("{}{:x}", Self::PREFIX, hasher.finalize()))
    }

    /// Get the full fingerprint string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content(s) => s,
            Self::Missing => Self::MISSING,
        }
    }

    /// Get just the hex digest, if any
    pub fn hex(&self) -> Option<&str> {
        match self {
            Self::Content(s) => Some(s.strip_prefix(Self::PREFIX).unwrap_or(s)),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        if s == Self::MISSING {
            Self::Missing
        } else if s.starts_with(Self::PREFIX) {
            Self::Content(s)
        } else {
            Self::Content(format!("{}{}", Self::PREFIX, s))
        }
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.as_str().to_string()
    }
}
