//! Filesystem error types.

use std::io;
use thiserror::Error;

/// Errors that can occur while resolving or reading paths.
#[derive(Debug, Error)]
pub enum FsError {
    /// A path segment does not exist, or a blob was traversed as a directory.
    #[error("open {path}: file does not exist")]
    PathNotFound {
        /// The path as given by the caller.
        path: String,
    },

    /// A directory operation was attempted on a file.
    #[error("{path}: not a directory")]
    NotADirectory {
        /// Path of the file.
        path: String,
    },

    /// A file operation was attempted on a directory.
    #[error("{path}: is a directory")]
    NotAFile {
        /// Path of the directory.
        path: String,
    },

    /// A seek to an invalid position.
    #[error("seek {path}: invalid argument")]
    InvalidSeek {
        /// Path of the file or directory.
        path: String,
    },

    /// The path names an object that is neither a blob nor a tree.
    #[error("open {path}: unexpected git object type {found}")]
    UnexpectedObject {
        /// The path as given by the caller.
        path: String,
        /// Type of the object found, or `missing`.
        found: &'static str,
    },

    /// Reading file content failed.
    #[error("read {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An internal invariant was violated while traversing.
    #[error("{op} {path}: internal error: {message}")]
    Internal {
        /// The operation that failed.
        op: &'static str,
        /// The path being processed.
        path: String,
        /// Diagnostic message.
        message: String,
    },
}
