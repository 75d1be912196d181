#![no_main]
use driftlog::Record;
use driftlog::fmt::FormatTemplate;
use driftlog::level::Level;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Must not panic on any template string
    let template = FormatTemplate::parse(data);

    let mut record = Record::new(Level::Warn, "fuzz");
    record.channel = "fuzz".to_string();
    record.add_field("k", "v");
    let _ = template.render(&record, "%Y-%m-%d %H:%M:%S");
});
