use std::io;
use thiserror::Error;

/// Errors that can occur while writing or reading an SSTable.
#[derive(Debug, Error)]
pub enum SstableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Footer CRC mismatch, bad magic, unknown version, or a record whose
    /// declared sizes overrun the region bound.
    #[error("corrupt sstable: {0}")]
    Corruption(String),

    /// Caller misuse: out-of-order `add`, oversize key/value, or an
    /// operation attempted on an already-finalized writer.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
