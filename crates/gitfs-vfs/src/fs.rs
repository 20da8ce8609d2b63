//! Path resolution over a root tree.

use crate::boundary::guard;
use crate::node::{DirView, FileInfo, FileView, Node};
use crate::{FsError, Result};
use gitfs_storage::{tree_lookup, ObjectId, ObjectStore, ObjectType};

/// A read-only filesystem serving the tree rooted at one tree object.
#[derive(Debug)]
pub struct TreeFs {
    store: ObjectStore,
    root: ObjectId,
}

impl TreeFs {
    /// Creates a filesystem over `store`, rooted at the tree `root`.
    pub fn new(store: ObjectStore, root: ObjectId) -> Self {
        Self { store, root }
    }

    /// Returns the root tree id.
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Returns the backing store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Gives the backing store back to the caller.
    pub fn into_store(self) -> ObjectStore {
        self.store
    }

    /// Opens a slash-separated path; `"."` names the root.
    pub fn open(&self, path: &str) -> Result<Node<'_>> {
        guard("open", path, || self.open_resolved(path))
    }

    /// Returns metadata for a path.
    pub fn stat(&self, path: &str) -> Result<FileInfo> {
        Ok(self.open(path)?.stat().clone())
    }

    /// Reads the full content of a file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.open(path)?.into_file()?.contents().to_vec())
    }

    fn open_resolved(&self, path: &str) -> Result<Node<'_>> {
        let (id, name) = self.resolve(path)?;
        match self.store.lookup(&id) {
            Some(object) if object.object_type == ObjectType::Blob => {
                Ok(Node::File(FileView::new(path, name, object.data)))
            }
            Some(object) if object.object_type == ObjectType::Tree => Ok(Node::Directory(
                DirView::new(&self.store, path, name, object.data),
            )),
            other => Err(FsError::UnexpectedObject {
                path: path.to_string(),
                found: other.map_or("missing", |o| o.object_type.as_str()),
            }),
        }
    }

    /// Walks `path` from the root, returning the id it names and its final element.
    fn resolve<'p>(&self, path: &'p str) -> Result<(ObjectId, &'p str)> {
        if path == "." {
            return Ok((self.root, path));
        }

        let not_found = || FsError::PathNotFound {
            path: path.to_string(),
        };
        let mut id = self.root;
        let mut name = path;
        for segment in path.split('/') {
            let tree = self
                .store
                .lookup(&id)
                .filter(|object| object.object_type == ObjectType::Tree)
                .ok_or_else(not_found)?;
            let entry = tree_lookup(tree.data, segment.as_bytes()).ok_or_else(not_found)?;
            id = entry.id;
            name = segment;
        }
        tracing::trace!(path, %id, "resolved path");
        Ok((id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(store: &mut ObjectStore, entries: &[(&str, &str, ObjectId)]) -> ObjectId {
        let mut data = Vec::new();
        for (mode, name, id) in entries {
            data.extend_from_slice(format!("{mode} {name}\0").as_bytes());
            data.extend_from_slice(id.as_bytes());
        }
        store.insert(ObjectType::Tree, &data)
    }

    fn sample() -> TreeFs {
        let mut store = ObjectStore::new();
        let blob1 = store.insert(ObjectType::Blob, b"first file\n");
        let blob2 = store.insert(ObjectType::Blob, b"second file\n");
        let tree2 = tree(&mut store, &[("100644", "b.txt", blob2)]);
        let root = tree(
            &mut store,
            &[("100644", "a.txt", blob1), ("40000", "sub", tree2)],
        );
        TreeFs::new(store, root)
    }

    #[test]
    fn resolves_files() {
        let fs = sample();
        assert_eq!(fs.read("a.txt").unwrap(), b"first file\n");
        assert_eq!(fs.read("sub/b.txt").unwrap(), b"second file\n");

        let info = fs.stat("sub/b.txt").unwrap();
        assert_eq!(info.name, "b.txt");
        assert_eq!(info.path, "sub/b.txt");
        assert_eq!(info.size, 12);
        assert!(!info.is_dir());
    }

    #[test]
    fn dot_is_root() {
        let fs = sample();
        let node = fs.open(".").unwrap();
        assert!(node.is_dir());
        assert_eq!(node.stat().name, ".");
    }

    #[test]
    fn missing_paths() {
        let fs = sample();
        for path in ["missing", "sub/missing", "", "sub/", "/a.txt", "a.txt/x"] {
            assert!(
                matches!(fs.open(path), Err(FsError::PathNotFound { .. })),
                "{path:?} should not resolve"
            );
        }
    }

    #[test]
    fn subdirectory_lists_entries() {
        let fs = sample();
        let mut dir = fs.open("sub").unwrap().into_dir().unwrap();
        assert_eq!(dir.stat().name, "sub");
        let page = dir.read_dir(None).unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].name, "b.txt");
    }

    #[test]
    fn reading_a_directory_fails() {
        let fs = sample();
        assert!(matches!(fs.read("sub"), Err(FsError::NotAFile { .. })));
    }

    #[test]
    fn entries_naming_absent_objects() {
        let mut store = ObjectStore::new();
        let gitlink = ObjectId::from_bytes([5; 20]);
        let root = tree(&mut store, &[("160000", "vendored", gitlink)]);
        let fs = TreeFs::new(store, root);
        assert!(matches!(
            fs.open("vendored"),
            Err(FsError::UnexpectedObject {
                found: "missing",
                ..
            })
        ));
        assert!(matches!(
            fs.open("vendored/x"),
            Err(FsError::PathNotFound { .. })
        ));
    }

    #[test]
    fn root_that_is_not_a_tree() {
        let mut store = ObjectStore::new();
        let blob = store.insert(ObjectType::Blob, b"x");
        let fs = TreeFs::new(store, blob);
        assert!(fs.open(".").unwrap().into_file().is_ok());
        assert!(matches!(fs.open("x"), Err(FsError::PathNotFound { .. })));
    }

    #[test]
    fn into_store_returns_objects() {
        let fs = sample();
        let root = fs.root();
        let store = fs.into_store();
        assert!(store.contains(&root));
        assert_eq!(store.len(), 4);
    }
}
