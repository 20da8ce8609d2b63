//! Git object storage for gitfs.
//!
//! This crate provides the append-only, content-addressed store that a
//! shallow fetch decodes into, together with the parsers for the two object
//! encodings a filesystem view needs to walk: tree entries and commit headers.

mod commit;
mod error;
mod object;
mod store;
mod tree;

pub use commit::commit_header;
pub use error::StorageError;
pub use object::{ObjectId, ObjectType};
pub use store::{Object, ObjectStore};
pub use tree::{tree_lookup, TreeEntries, TreeEntry};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
