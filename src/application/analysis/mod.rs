//! Change Analysis
//!
//! Decides which tests a batch of file changes makes stale and keeps the
//! results that are still trustworthy.
//!
//! - `ChangeAnalyzer` - classification and stale-set computation
//! - `ResultCache` - fingerprint-validated results plus the dependency index
//! - `discovery` - packages, declared tests and dependency files on disk

mod analyzer;
mod cache;
pub mod discovery;


pub use analyzer::{has_test_files, ChangeAnalyzer, StaleSet};
pub use cache::{DependencyIndex, ResultCache};
