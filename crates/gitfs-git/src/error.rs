//! Git protocol error types.

use thiserror::Error;

/// Errors that can occur during git protocol operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A pkt-line length prefix that is not hex or uses a reserved length.
    #[error("malformed pkt-line: {0}")]
    MalformedFraming(String),

    /// A payload too large to fit a pkt-line length field.
    #[error("pkt-line payload too large: {0} bytes")]
    PacketTooLarge(usize),

    /// Capability discovery failed.
    #[error("handshake: {0}")]
    HandshakeFailed(String),

    /// The server does not advertise a capability a command needs.
    #[error("{command}: server does not support {capability}")]
    UnsupportedCapability {
        /// The command being attempted.
        command: &'static str,
        /// The missing capability.
        capability: &'static str,
    },

    /// The ls-refs command failed or returned an unparseable response.
    #[error("refs: {0}")]
    RefListingFailed(String),

    /// No ref with the requested name exists on the server.
    #[error("resolve {0}: unknown ref")]
    UnknownRef(String),

    /// The fetch command failed, or the server reported an error on the error band.
    #[error("fetch: {0}")]
    RemoteFetchError(String),

    /// The data is not a pack archive.
    #[error("malformed git pack: {0}")]
    InvalidPack(String),

    /// The pack exceeded the configured size ceiling.
    #[error("pack exceeds {limit} bytes")]
    PackTooLarge {
        /// The configured ceiling.
        limit: u64,
    },

    /// A pack archive version other than 2.
    #[error("cannot read git pack v{0}")]
    UnsupportedPackVersion(u32),

    /// The trailing pack checksum does not match its content.
    #[error("malformed git pack: bad checksum")]
    ChecksumMismatch,

    /// A ref-delta names a base object that is not in the store.
    #[error("unknown delta base {0}")]
    UnknownDeltaBase(gitfs_storage::ObjectId),

    /// An offset-delta points outside the archive or at an undecodable record.
    #[error("invalid delta offset {offset} at {position}")]
    InvalidDeltaOffset {
        /// Position of the delta record in the object region.
        position: usize,
        /// The decoded backward offset.
        offset: u64,
    },

    /// A record's compressed data or delta program is malformed.
    #[error("corrupt object data at {position}: {reason}")]
    CorruptObjectData {
        /// Position of the record in the object region.
        position: usize,
        /// What was wrong.
        reason: String,
    },

    /// A delta's declared source size differs from its base object's size.
    #[error("delta source size {declared} does not match base size {actual}")]
    DeltaSizeMismatch {
        /// Source size declared by the delta.
        declared: u64,
        /// Actual base object size.
        actual: usize,
    },

    /// A delta program ended before filling its target.
    #[error("delta encoding too short: {missing} bytes missing")]
    DeltaUnderflow {
        /// Bytes of the target left unwritten.
        missing: usize,
    },

    /// The object region is longer than the declared objects.
    #[error("malformed git pack: {0} bytes of junk after objects")]
    TrailingGarbage(usize),

    /// A client configuration value is out of range.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The transport failed; `op` names the protocol step.
    #[error("{op}: {source}")]
    Transport {
        /// The protocol step: `handshake`, `ls-refs` or `fetch`.
        op: &'static str,
        /// The underlying transport failure.
        #[source]
        source: std::io::Error,
    },

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] gitfs_storage::StorageError),

    /// Filesystem error.
    #[error(transparent)]
    Fs(#[from] gitfs_vfs::FsError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
