//! Toonshift Model - the animation style-transfer networks
//!
//! The [`Generator`] is a fixed-topology convolutional network: a 7-stage
//! encoder, an 8-block inverted-residual bottleneck at constant width, and a
//! 9-stage decoder bounded by tanh. The [`Discriminator`] exists only for
//! training and is never touched during inference.
//!
//! Both are plain candle [`Module`](candle_nn::Module)s built from a
//! [`VarBuilder`](candle_nn::VarBuilder), so parameters can come from a
//! trainable [`VarMap`](candle_nn::VarMap), a safetensors checkpoint, or a
//! pretrained PyTorch `.pth` bundle.

pub mod blocks;
pub mod checkpoint;
pub mod discriminator;
pub mod error;
pub mod generator;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointMeta, OptimizerMeta};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use error::ModelError;
pub use generator::{generator_from_file, Generator};

use candle_core::Device;

/// Pick the inference device: CUDA when available, CPU otherwise.
pub fn select_device() -> Result<Device, ModelError> {
    Ok(Device::cuda_if_available(0)?)
}
