//! Crate-wide error taxonomy.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An axis spec passed to [`crate::mesh::Mesh::new`] was malformed (`max <= min` or
    /// `count == 0`).
    #[error("invalid axis spec: {0}")]
    InvalidAxis(String),
    /// [`crate::mesh::Mesh::index_to_position`] was called with `idx >= size`.
    #[error("index {idx} is out of range for mesh of size {size}")]
    OutOfRange {
        /// The offending flat index.
        idx: usize,
        /// The mesh's total element count.
        size: usize,
    },
    /// A value buffer could not be allocated.
    #[error("failed to allocate a mesh buffer of {0} elements")]
    AllocationFailed(usize),
    /// The collective all-reduce transport reported an error.
    #[error("reduction across workers failed: {0}")]
    ReductionFailed(String),
    /// The engine's state machine was driven out of order.
    #[error("illegal engine transition: {0}")]
    InvalidState(String),
    /// A checkpoint payload was malformed, or its quadrature constants didn't match the
    /// running binary's.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
    /// An error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for this crate's `Result`.
pub type Result<T> = std::result::Result<T, Error>;
