//! Domain Value Objects
//!
//! Immutable value types shared by every component of the engine.

mod change;
mod fingerprint;
mod ignore_patterns;
mod test_key;

pub use change::{Batch, ChangeKind, FileChange};
pub use fingerprint::Fingerprint;
pub use ignore_patterns::{IgnoreError, IgnorePatterns, IGNORE_FILE};
pub use test_key::{package_id, TestKey, TestTarget, ROOT_PACKAGE};
