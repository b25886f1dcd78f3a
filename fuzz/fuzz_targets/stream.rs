#![no_main]
use std::io::{Cursor, Read, Seek, SeekFrom};

use libfuzzer_sys::fuzz_target;
use mcx::{FilterOptions, McStream};

fuzz_target!(|data: &[u8]| {
    let opts = FilterOptions::default().with_supported_namespace("urn:a", ["a"]);

    let Ok(mut bulk) = McStream::new(data, &opts) else {
        return;
    };
    let mut full = Vec::new();
    if bulk.read_to_end(&mut full).is_err() {
        return;
    }

    // Rueckwaerts-Seek mit Replay liefert dieselben Bytes.
    let Ok(mut s) = McStream::new(Cursor::new(data), &opts) else {
        return;
    };
    let mid = (full.len() / 2) as u64;
    let mut head = vec![0u8; full.len()];
    let _ = s.read(&mut head);
    assert_eq!(s.seek(SeekFrom::Start(mid)).ok(), Some(mid));
    let mut tail = Vec::new();
    s.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, full[mid as usize..]);
});
