#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Must not panic; formatting any parsed size must not panic either
    if let Some(n) = driftlog::parse_size(data) {
        let _ = driftlog::format_size(n);
    }
});
