//! End-to-end path resolution and listing over a hand-built store.

use gitfs_storage::{ObjectId, ObjectStore, ObjectType};
use gitfs_vfs::{FsError, Node, TreeFs, MODE_DIR, MODE_FILE};
use proptest::prelude::*;
use std::io::{Read, Seek, SeekFrom};

fn encode_tree(entries: &[(u32, &str, ObjectId)]) -> Vec<u8> {
    let mut data = Vec::new();
    for (mode, name, id) in entries {
        data.extend_from_slice(format!("{mode:o} {name}\0").as_bytes());
        data.extend_from_slice(id.as_bytes());
    }
    data
}

/// `{"a.txt": blob1, "sub": {"b.txt": blob2}}`
fn fixture() -> (TreeFs, ObjectId, ObjectId) {
    let mut store = ObjectStore::new();
    let blob1 = store.insert(ObjectType::Blob, b"contents of a\n");
    let blob2 = store.insert(ObjectType::Blob, b"contents of b\n");
    let tree2 = store.insert(ObjectType::Tree, &encode_tree(&[(0o100644, "b.txt", blob2)]));
    let root = store.insert(
        ObjectType::Tree,
        &encode_tree(&[(0o100644, "a.txt", blob1), (0o40000, "sub", tree2)]),
    );
    (TreeFs::new(store, root), blob1, blob2)
}

#[test]
fn resolves_nested_paths() {
    let (fs, blob1, blob2) = fixture();

    let mut a = fs.open("a.txt").unwrap().into_file().unwrap();
    let mut content = Vec::new();
    a.read_to_end(&mut content).unwrap();
    assert_eq!(content, fs.store().lookup(&blob1).unwrap().data);

    let b = fs.open("sub/b.txt").unwrap().into_file().unwrap();
    assert_eq!(b.contents(), fs.store().lookup(&blob2).unwrap().data);
    assert_eq!(b.stat().mode, MODE_FILE);

    assert!(matches!(fs.open("missing"), Err(FsError::PathNotFound { .. })));
    assert!(matches!(fs.open("a.txt/x"), Err(FsError::PathNotFound { .. })));
}

#[test]
fn paginates_then_signals_end_once() {
    let (fs, _, _) = fixture();
    let mut root = fs.open(".").unwrap();
    assert_eq!(root.stat().mode, MODE_DIR);

    let first = root.read_dir(Some(1)).unwrap();
    let second = root.read_dir(Some(1)).unwrap();
    let last = root.read_dir(None).unwrap();

    assert_eq!(first.entries[0].name, "a.txt");
    assert!(!first.end);
    assert_eq!(second.entries[0].name, "sub");
    assert!(!second.end);
    assert!(last.entries.is_empty());
    assert!(last.end);

    root.rewind().unwrap();
    let again: Vec<_> = [root.read_dir(Some(1)).unwrap(), root.read_dir(Some(1)).unwrap()]
        .into_iter()
        .flat_map(|page| page.entries)
        .map(|info| info.name)
        .collect();
    assert_eq!(again, ["a.txt", "sub"]);
}

#[test]
fn seek_start_rewinds_directories() {
    let (fs, _, _) = fixture();
    let mut root = fs.open(".").unwrap();
    root.read_dir(None).unwrap();
    assert_eq!(root.seek(SeekFrom::Start(0)).unwrap(), 0);
    assert_eq!(root.read_dir(None).unwrap().entries.len(), 2);
}

#[test]
fn file_views_are_independent() {
    let (fs, _, _) = fixture();
    let mut one = fs.open("a.txt").unwrap().into_file().unwrap();
    let mut two = fs.open("a.txt").unwrap().into_file().unwrap();
    one.seek(SeekFrom::Start(9)).unwrap();
    let mut buf = [0u8; 8];
    two.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"contents");
    let mut tail = String::new();
    one.read_to_string(&mut tail).unwrap();
    assert_eq!(tail, "of a\n");
}

#[test]
fn node_type_mismatch() {
    let (fs, _, _) = fixture();
    let mut file = fs.open("a.txt").unwrap();
    assert!(matches!(file, Node::File(_)));
    assert!(matches!(
        file.read_dir(Some(1)),
        Err(FsError::NotADirectory { .. })
    ));
    assert!(matches!(
        fs.open("sub").unwrap().into_file(),
        Err(FsError::NotAFile { .. })
    ));
}

proptest! {
    /// Any sequence of page sizes yields exactly the full listing, in order.
    #[test]
    fn prop_pages_concatenate_to_full_listing(
        count in 0usize..40,
        pages in prop::collection::vec(1usize..7, 1..50),
    ) {
        let mut store = ObjectStore::new();
        let names: Vec<String> = (0..count).map(|i| format!("file{i:03}")).collect();
        let entries: Vec<(u32, &str, ObjectId)> = names
            .iter()
            .map(|name| {
                let id = store.insert(ObjectType::Blob, name.as_bytes());
                (0o100644, name.as_str(), id)
            })
            .collect();
        let root = store.insert(ObjectType::Tree, &encode_tree(&entries));
        let fs = TreeFs::new(store, root);

        let mut dir = fs.open(".").unwrap().into_dir().unwrap();
        let mut seen = Vec::new();
        let mut ended = false;
        for limit in pages.iter().copied().chain(std::iter::repeat(3)).take(pages.len() + count + 1) {
            let page = dir.read_dir(Some(limit)).unwrap();
            prop_assert!(page.entries.len() <= limit);
            if page.end {
                prop_assert!(page.entries.is_empty());
                ended = true;
                break;
            }
            seen.extend(page.entries.into_iter().map(|e| e.name));
        }
        prop_assert!(ended);
        prop_assert_eq!(seen, names);
    }

    /// Resolution never panics on arbitrary paths, even over garbage trees.
    #[test]
    fn prop_open_never_panics(tree in prop::collection::vec(any::<u8>(), 0..200), path in "[a-z./]{0,12}") {
        let mut store = ObjectStore::new();
        let root = store.insert(ObjectType::Tree, &tree);
        let fs = TreeFs::new(store, root);
        if let Ok(mut node) = fs.open(&path) {
            let _ = node.read_dir(None);
        }
    }
}
