//! Toonshift Pipeline - applying the generator to real inputs
//!
//! The [`Transformer`] owns a loaded generator and exposes the three entry
//! points: single image, directory of images, and video. Everything is
//! synchronous and blocking; the only parallelism is whatever the tensor
//! backend does inside a forward pass.

pub mod error;
pub mod transformer;
pub mod video;

pub use error::PipelineError;
pub use transformer::{DirOptions, Transformer, VideoOptions};
pub use video::{probe, VideoError, VideoMeta};
