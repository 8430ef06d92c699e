use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("repository not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("repository at {0} is locked by another process")]
    Locked(PathBuf),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("cannot encode config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("pin error: {0}")]
    Pin(#[from] strata_pin::PinError),
}

pub type NodeResult<T> = Result<T, NodeError>;
