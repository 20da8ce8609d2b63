//! Storage error types.

use crate::{ObjectId, ObjectType};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Text that is not a 40-digit hexadecimal object id.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// The requested object is not in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// The object exists but has a different type than required.
    #[error("object {id}: expected {expected}, found {found}")]
    UnexpectedType {
        /// The object that was looked up.
        id: ObjectId,
        /// The type the caller required.
        expected: ObjectType,
        /// The type actually stored.
        found: ObjectType,
    },

    /// A commit object without a usable `tree` header.
    #[error("commit {0}: no tree")]
    NoTreeInCommit(ObjectId),
}
