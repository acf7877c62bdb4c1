//! Error types for the training backend.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Data error: {0}")]
    Data(#[from] tagtune_data::Error),

    #[error("Loss is not finite at step {step}: {value}")]
    NonFiniteLoss { step: u64, value: f32 },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Backend init failed: {0}")]
    BackendInit(String),
}
