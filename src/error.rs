use thiserror::Error;

use crate::model::ModelError;
use crate::training::DatasetError;

/// Crate-level error for a training run. Apart from per-epoch data
/// exhaustion (which is not an error at all), everything here is fatal:
/// there are no retries and no partial-state recovery.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("data source error: {0}")]
    Data(#[from] DatasetError),

    #[error("failed to restore checkpoint: {0}")]
    Restore(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
