use thiserror::Error;

use crate::adder::SkipReason;

#[derive(Debug, Error)]
pub enum AddError {
    /// A top-level item was excluded by the hidden or ignore policy.
    #[error("{0}")]
    Skipped(SkipReason),

    #[error("{0} is a directory, use recursive mode to add it")]
    NotRecursive(String),

    #[error("{path} is nested deeper than {max} levels")]
    DepthLimitExceeded { path: String, max: usize },

    #[error("invalid ignore pattern: {0}")]
    IgnorePattern(#[from] ignore::Error),

    #[error("output stream closed")]
    OutputClosed,

    #[error("add task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DAG error: {0}")]
    Dag(#[from] strata_dag::DagError),

    #[error("pin error: {0}")]
    Pin(#[from] strata_pin::PinError),
}

pub type AddResult<T> = Result<T, AddError>;
