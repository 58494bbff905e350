//! Model errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors from network construction and checkpoint handling
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(PathBuf),

    #[error("unsupported weight format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("parameter load from {path} failed: {source}")]
    StrictLoad {
        path: PathBuf,
        source: candle_core::Error,
    },

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("checkpoint metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
