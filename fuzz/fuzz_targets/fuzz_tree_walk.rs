//! Fuzz target for tree parsing and path resolution.
//!
//! Stores the input as a root tree and walks every entry it yields through
//! the filesystem view.

#![no_main]

use gitfs_storage::{ObjectStore, ObjectType, TreeEntries};
use gitfs_vfs::TreeFs;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut store = ObjectStore::new();
    let root = store.insert(ObjectType::Tree, data);

    let names: Vec<String> = TreeEntries::new(data)
        .map(|entry| String::from_utf8_lossy(entry.name).into_owned())
        .collect();

    let fs = TreeFs::new(store, root);
    if let Ok(mut node) = fs.open(".") {
        while let Ok(page) = node.read_dir(Some(8)) {
            if page.end {
                break;
            }
        }
    }
    for name in names {
        let _ = fs.stat(&name);
        let _ = fs.read(&name);
    }
});
