#![no_main]

use libfuzzer_sys::fuzz_target;
use sentinel::domain::entities::CachedResult;
use sentinel::ResultCache;

fuzz_target!(|data: &[u8]| {
    // Any decodable entry list must rebuild a consistent cache
    if let Ok(entries) = serde_json::from_slice::<Vec<CachedResult>>(data) {
        let cache = ResultCache::from_entries(entries);
        assert_eq!(cache.entries().len(), cache.len());
    }
});
