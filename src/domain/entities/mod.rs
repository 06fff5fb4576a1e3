//! Domain Entities
//!
//! Results produced by test runs and what the cache keeps of them.
//! - `TestResult` - Outcome of one test or subtest
//! - `TestSuite` - Ordered results of one package with derived counts
//! - `ExecutionResult` - Merged suites of one run
//! - `CachedResult` - Stored outcome plus the fingerprints it depended on

mod cached_result;
mod execution_result;
mod suite;
mod test_result;

pub use cached_result::CachedResult;
pub use execution_result::ExecutionResult;
pub use suite::TestSuite;
pub use test_result::{ErrorKind, SourceLocation, TestError, TestResult, TestStatus};
