//! Append-only object store.

use crate::{commit_header, ObjectId, ObjectType, Result, StorageError};
use std::collections::HashMap;

/// Location of one object inside the backing buffer.
#[derive(Debug, Clone, Copy)]
struct StoredObject {
    object_type: ObjectType,
    offset: usize,
    len: usize,
}

/// A borrowed view of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Object<'a> {
    /// The type of object.
    pub object_type: ObjectType,
    /// The raw (uncompressed) content, borrowed from the store.
    pub data: &'a [u8],
}

/// Content-addressed object store.
///
/// All object content is concatenated into a single buffer and indexed by id.
/// Ranges are never rewritten or freed, so a view handed out by
/// [`lookup`](Self::lookup) stays valid for as long as the store is borrowed.
/// There is no internal locking: share a store between threads by wrapping the
/// whole value in one lock.
#[derive(Debug, Default)]
pub struct ObjectStore {
    /// Objects indexed by their SHA-1 hash.
    index: HashMap<ObjectId, StoredObject>,
    /// Concatenation of all object content.
    data: Vec<u8>,
}

impl ObjectStore {
    /// Creates a new empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose buffer can hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            data: Vec::with_capacity(capacity),
        }
    }

    /// Reserves room for at least `additional` more content bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Stores an object and returns its id.
    ///
    /// Inserting content that is already present returns the existing id and
    /// copies nothing.
    pub fn insert(&mut self, object_type: ObjectType, content: &[u8]) -> ObjectId {
        let id = ObjectId::hash_object(object_type, content);
        if !self.index.contains_key(&id) {
            let entry = StoredObject {
                object_type,
                offset: self.data.len(),
                len: content.len(),
            };
            self.data.extend_from_slice(content);
            self.index.insert(id, entry);
        }
        id
    }

    /// Looks up an object by id.
    pub fn lookup(&self, id: &ObjectId) -> Option<Object<'_>> {
        let entry = self.index.get(id)?;
        Some(Object {
            object_type: entry.object_type,
            data: &self.data[entry.offset..entry.offset + entry.len],
        })
    }

    /// Retrieves an object by id, failing when it is absent.
    pub fn get(&self, id: &ObjectId) -> Result<Object<'_>> {
        self.lookup(id).ok_or(StorageError::ObjectNotFound(*id))
    }

    /// Checks if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the total number of content bytes held.
    pub fn buffer_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the root tree id recorded in the given commit.
    pub fn commit_tree(&self, id: &ObjectId) -> Result<ObjectId> {
        let object = self.get(id)?;
        if object.object_type != ObjectType::Commit {
            return Err(StorageError::UnexpectedType {
                id: *id,
                expected: ObjectType::Commit,
                found: object.object_type,
            });
        }
        let tree = commit_header(object.data, "tree").ok_or(StorageError::NoTreeInCommit(*id))?;
        let tree = std::str::from_utf8(tree).map_err(|_| StorageError::NoTreeInCommit(*id))?;
        ObjectId::from_hex(tree).map_err(|_| StorageError::NoTreeInCommit(*id))
    }
}
