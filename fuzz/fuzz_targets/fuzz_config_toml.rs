#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Parsing config, including unknown-key detection, must never panic
        let _ = sentinel::config::parse_with_warnings(content, Path::new(".sentinel.toml"));
    }
});
