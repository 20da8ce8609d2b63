//! Fuzz target for pkt-line decoding.
//!
//! Feeds arbitrary bytes to the pkt-line reader; every input must end in a
//! packet stream or an error, never a panic.

#![no_main]

use gitfs_git::PktLineReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(data);
    let mut consumed = 0;

    // Each packet consumes at least four bytes, so this terminates.
    while let Ok(packet) = reader.read() {
        let frame = packet.encode().expect("decoded packet re-encodes");
        // The length prefix may arrive in upper case.
        assert!(data[consumed..consumed + frame.len()].eq_ignore_ascii_case(&frame));
        consumed += frame.len();
    }
});
