//! Fuzz target for pack decoding.
//!
//! Tests that the pack decoder handles arbitrary input without panicking.

#![no_main]

use gitfs_storage::ObjectStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Create a fresh object store for each fuzz iteration
    let mut store = ObjectStore::new();

    if let Ok(summary) = gitfs_git::unpack(data, &mut store) {
        for id in &summary.ids {
            assert!(store.contains(id));
        }
    }
});
