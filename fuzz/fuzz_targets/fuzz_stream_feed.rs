#![no_main]

use libfuzzer_sys::fuzz_target;
use sentinel::application::StreamProcessor;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut processor = StreamProcessor::new("pkg", std::env::temp_dir(), 3);
    for line in text.lines() {
        processor.feed(line);
    }
    let suite = processor.finalize();
    assert_eq!(suite.len(), suite.passed() + suite.failed() + suite.skipped());
});
