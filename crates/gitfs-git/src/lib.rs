//! Git protocol implementation for gitfs.
//!
//! This crate implements the pkt-line framing, the pack file format and a
//! protocol v2 client that performs shallow fetches over smart HTTP, decoding
//! the result into an [`ObjectStore`](gitfs_storage::ObjectStore).

mod builder;
mod client;
mod config;
mod delta;
mod error;
mod interrupt;
mod pack;
mod pktline;
mod transport;

pub use builder::PackBuilder;
pub use client::{
    Client, Ref, ADVERTISEMENT_CONTENT_TYPE, REQUEST_CONTENT_TYPE, RESULT_CONTENT_TYPE,
};
pub use config::ClientConfig;
pub use delta::{apply_delta, DeltaBuilder};
pub use error::GitError;
pub use interrupt::CancellationFlag;
pub use pack::{unpack, PackDecoder, PackSummary};
pub use pktline::{PktLine, PktLineReader, PktLineWriter};
pub use transport::{HttpTransport, Method, Request, Response, Transport};

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
