//! Conversions between raw frames and network tensors

use crate::error::CoreError;
use crate::frame::RgbFrame;
use candle_core::{DType, Device, IndexOp, Tensor};

/// Map u8-range pixel values into the network's `[-1, 1]` range.
pub fn normalize(xs: &Tensor) -> Result<Tensor, candle_core::Error> {
    xs.affine(1.0 / 127.5, -1.0)
}

/// Inverse of [`normalize`], clamped back into the u8 range.
pub fn denormalize(xs: &Tensor) -> Result<Tensor, candle_core::Error> {
    xs.affine(127.5, 127.5)?.clamp(0f32, 255f32)
}

/// Stack frames into a normalized NCHW f32 batch tensor.
///
/// All frames in a batch must share the same dimensions.
pub fn batch_to_tensor(frames: &[RgbFrame], device: &Device) -> Result<Tensor, CoreError> {
    let first = frames.first().ok_or(CoreError::EmptyBatch)?;
    let (w, h) = first.dimensions();
    for frame in frames {
        if frame.dimensions() != (w, h) {
            return Err(CoreError::ShapeMismatch {
                expected: (w, h),
                actual: frame.dimensions(),
            });
        }
    }

    let mut data = Vec::with_capacity(frames.len() * first.data().len());
    for frame in frames {
        data.extend(frame.data().iter().map(|&b| b as f32));
    }

    let batch = Tensor::from_vec(
        data,
        (frames.len(), h as usize, w as usize, 3),
        device,
    )?;
    // Channel-first for the convolution stack.
    let batch = batch.permute((0, 3, 1, 2))?.contiguous()?;
    Ok(normalize(&batch)?)
}

/// Unpack a network output batch (NCHW, `[-1, 1]`) into channel-last frames.
pub fn tensor_to_frames(xs: &Tensor) -> Result<Vec<RgbFrame>, CoreError> {
    let (n, _c, h, w) = xs.dims4()?;
    // Round rather than truncate so the denormalization stays the exact
    // inverse of normalize up to integer rounding.
    let xs = denormalize(xs)?
        .round()?
        .permute((0, 2, 3, 1))?
        .contiguous()?
        .to_dtype(DType::U8)?;

    let mut frames = Vec::with_capacity(n);
    for i in 0..n {
        let data = xs.i(i)?.flatten_all()?.to_vec1::<u8>()?;
        frames.push(RgbFrame::new(w as u32, h as u32, data)?);
    }
    Ok(frames)
}
