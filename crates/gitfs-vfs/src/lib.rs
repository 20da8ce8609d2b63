//! Read-only filesystem view over a git tree.
//!
//! A [`TreeFs`] owns an [`ObjectStore`](gitfs_storage::ObjectStore) and the id
//! of a root tree. Paths are resolved lazily against the raw tree objects, and
//! opening a path yields a [`Node`]: either a [`FileView`] that reads blob
//! content straight out of the store, or a [`DirView`] that pages through a
//! tree's entries.

mod boundary;
mod error;
mod fs;
mod node;

pub use error::FsError;
pub use fs::TreeFs;
pub use node::{DirPage, DirView, FileInfo, FileView, Node, MODE_DIR, MODE_FILE};

/// Result type for filesystem operations.
pub type Result<T> = std::result::Result<T, FsError>;
