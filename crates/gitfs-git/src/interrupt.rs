//! Cooperative cancellation.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation flag shared between the caller and a running client.
///
/// Clones observe the same flag. Once cancelled, it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a new cancellation flag in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::GitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A reader that fails every read once its flag is cancelled.
pub(crate) struct Interruptible<R> {
    inner: R,
    flag: CancellationFlag,
}

impl<R> Interruptible<R> {
    pub(crate) fn new(inner: R, flag: CancellationFlag) -> Self {
        Self { inner, flag }
    }
}

impl<R: Read> Read for Interruptible<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Not ErrorKind::Interrupted: read_exact would retry it forever.
        if self.flag.is_cancelled() {
            return Err(io::Error::other("operation cancelled"));
        }
        self.inner.read(buf)
    }
}
