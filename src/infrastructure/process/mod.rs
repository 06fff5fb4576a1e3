//! Test subprocess construction


pub use go_test::GoTestCommand;
