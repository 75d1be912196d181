#![no_main]
use driftlog::{BufferMode, BufferedWriter, MemorySink, Sink};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, bool, Vec<Vec<u8>>)| {
    let (capacity, line_mode, writes) = input;
    let sink = MemorySink::new();
    let mode = if line_mode { BufferMode::Line } else { BufferMode::Bytes };
    let Ok(mut writer) = BufferedWriter::new(sink.clone(), mode, usize::from(capacity) + 1) else {
        return;
    };

    let mut expected = Vec::new();
    for w in &writes {
        writer.write_all(w).unwrap();
        expected.extend_from_slice(w);
    }
    writer.close().unwrap();

    // Every byte arrives exactly once and in order
    assert_eq!(sink.contents(), expected);
});
