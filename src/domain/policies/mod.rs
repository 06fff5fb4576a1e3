//! Domain Policies
//!
//! Pure rules that decide how changes are interpreted.

mod classification;
mod watch_mode;

pub use classification::{
    classify, is_go_file, is_relevant, is_test_file, CONFIG_FILES, DEPENDENCY_FILES,
    TEST_FILE_SUFFIX,
};
pub use watch_mode::WatchMode;
