use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcError {
    #[error("garbage collection cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("mark failed: {0}")]
    Mark(#[from] strata_pin::PinError),

    #[error("gc task failed: {0}")]
    Task(String),
}

pub type GcResult<T> = Result<T, GcError>;
