use strata_dag::DagError;
use strata_store::StoreError;
use strata_types::{Key, TypeError};

/// Errors from pin set operations.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("dag error: {0}")]
    Dag(#[from] DagError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pin pointer: {0}")]
    Pointer(#[from] TypeError),

    /// The block to pin is not in the data domain.
    #[error("cannot pin {0}: block not found")]
    NotFound(Key),

    #[error("{0} is not pinned")]
    NotPinned(Key),

    #[error("{0} is already pinned recursively")]
    AlreadyRecursive(Key),

    /// Removing a recursive pin needs an explicit recursive unpin.
    #[error("{0} is pinned recursively")]
    IsRecursive(Key),

    #[error("indirect pins are derived and cannot be set")]
    IndirectNotAllowed,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("corrupt pin record {key}: {reason}")]
    Corrupt { key: Key, reason: String },
}

pub type PinResult<T> = Result<T, PinError>;
