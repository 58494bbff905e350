//! Core error surface

use std::path::PathBuf;
use thiserror::Error;

/// Errors from frame I/O and tensor conversion
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("could not read image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("could not write image {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("pixel buffer of {len} bytes does not match {width}x{height}x3")]
    BufferLength { width: u32, height: u32, len: usize },

    #[error("frame shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("empty frame batch")]
    EmptyBatch,

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
