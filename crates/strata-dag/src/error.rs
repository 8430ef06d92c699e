//! Error types for DAG operations.

use strata_store::StoreError;
use strata_types::Key;

/// Errors that can occur while building or reading the DAG.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// The underlying block store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Reading the input stream failed.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    /// A block could not be decoded as a DAG node.
    #[error("malformed node {key}: {reason}")]
    Malformed { key: Key, reason: String },

    /// Encoding a node failed.
    #[error("encoding error: {0}")]
    Encode(String),

    /// A directory already has an entry with this name.
    #[error("duplicate link name: {0}")]
    DuplicateLink(String),

    /// The operation needs a file node.
    #[error("not a file: {0}")]
    NotAFile(Key),

    /// The operation needs a directory node.
    #[error("not a directory: {0}")]
    NotADirectory(Key),

    /// The operation does not apply to this kind of node.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
