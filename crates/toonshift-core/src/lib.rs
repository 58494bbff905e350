//! Toonshift Core - frame types and tensor ops shared across the pipeline
//!
//! Images move through the pipeline in two representations:
//!
//! - [`RgbFrame`]: raw 8-bit RGB, channel-last, for all file and video I/O
//! - candle tensors: NCHW `f32` normalized to `[-1, 1]`, for the network
//!
//! The conversions between the two live in [`ops`] and are exact inverses up
//! to integer rounding, which the generator's bounded tanh output relies on.

pub mod error;
pub mod frame;
pub mod ops;

pub use error::CoreError;
pub use frame::{is_supported_image, read_image, RgbFrame, SUPPORTED_EXTENSIONS};
pub use ops::{batch_to_tensor, denormalize, normalize, tensor_to_frames};
