//! Fuzz target for delta application.
//!
//! The first byte picks how much of the input is the base; the rest is the
//! delta instruction stream.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (base, delta) = rest.split_at(split);
    let _ = gitfs_git::apply_delta(base, delta, 0);
});
