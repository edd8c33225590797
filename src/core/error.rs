//! Error types for the time-varying graph engine.
//!
//! The taxonomy mirrors spec §7 exactly: `OutOfMemory`, `ReadOnly`,
//! `InvalidArgument`, `Unsupported`, `IoError`. `Unreachable` (BFS target not
//! found) is deliberately *not* a variant here — spec §7 calls it out as a
//! known limitation surfaced via sentinel values (`u64::MAX` / `f64::INFINITY`)
//! rather than a typed error, and that contract is preserved rather than
//! "fixed" on our own initiative.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by graph/vector/BFS/persistence operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An allocation failed; the operation was rolled back and the object's
    /// invariants are preserved.
    #[error("out of memory")]
    OutOfMemory,

    /// A mutation was attempted on a `READONLY` container.
    #[error("container is read-only")]
    ReadOnly,

    /// A flag mismatch, out-of-range bit exponent, or zero-size input to an
    /// operation requiring at least one element.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation is not defined for this container's flags,
    /// e.g. `connected_components` on a directed graph.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// File open/read/write failure or a binary format mismatch.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Prometheus metric registration failed (ambient observability only;
    /// never returned from a graph/vector/BFS operation).
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Build an `InvalidArgument` error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build an `Unsupported` error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// `true` if the object was left unchanged by the failed operation (true
    /// for every variant except a successfully-applied-but-later-detected
    /// format mismatch during `load`, which has no object to leave unchanged).
    pub fn is_rollback_safe(&self) -> bool {
        !matches!(self, Error::IoError(_))
    }
}
