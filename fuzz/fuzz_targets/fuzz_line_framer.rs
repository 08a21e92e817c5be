//! Fuzz target: `LineFramer::on_raw_chunk`
//!
//! The first input byte picks a chunk size; the rest is fed as a raw
//! GATT write stream. Every emitted line must be non-empty, within the
//! length limit and free of terminators.
//!
//! cargo fuzz run fuzz_line_framer

#![no_main]

use blelink::link::LineFramer;
use libfuzzer_sys::fuzz_target;

const MAX_LEN: usize = 64;

fuzz_target!(|data: &[u8]| {
    let Some((&size, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(size).max(1);

    let mut framer = LineFramer::new(1_500, MAX_LEN);
    let mut now_ms = 0u32;
    for piece in stream.chunks(chunk) {
        framer.on_raw_chunk(piece, now_ms, |line| {
            let bytes = line.as_bytes();
            assert!(!bytes.is_empty(), "framer emitted an empty line");
            assert!(bytes.len() <= MAX_LEN, "line exceeds max_len");
            assert!(!bytes.contains(&b'\n') && !bytes.contains(&b'\r'));
        });
        assert!(framer.pending() <= MAX_LEN);
        // Some pieces arrive after the receive timeout.
        now_ms = now_ms.wrapping_add(u32::from(size) * 10);
    }

    framer.reset();
    assert_eq!(framer.pending(), 0);
});
