//! Pipeline error surface

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the transformation entry points
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("output {0} must be a .png file")]
    NonPngOutput(PathBuf),

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error(transparent)]
    Core(#[from] toonshift_core::CoreError),

    #[error(transparent)]
    Model(#[from] toonshift_model::ModelError),

    #[error(transparent)]
    Weights(#[from] toonshift_weights::WeightError),

    #[error(transparent)]
    Video(#[from] crate::video::VideoError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
