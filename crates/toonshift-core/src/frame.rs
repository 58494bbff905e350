//! Raw RGB frames and image file I/O

use crate::error::CoreError;
use image::{imageops::FilterType, DynamicImage, RgbImage};
use std::path::Path;

/// File extensions the directory walker treats as images.
///
/// Anything else is skipped silently.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "jpe", "png", "bmp"];

/// Check whether a path has a recognized image extension (case-insensitive).
pub fn is_supported_image(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Read an image file into an [`RgbFrame`].
///
/// Missing or undecodable files are an immediate error; nothing downstream
/// runs on a frame we could not load.
pub fn read_image(path: impl AsRef<Path>) -> Result<RgbFrame, CoreError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| CoreError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RgbFrame::from_dynamic(&img))
}

/// An owned 8-bit RGB pixel buffer, height x width x 3, channel-last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbFrame {
    /// Create a frame from a raw RGB buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CoreError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CoreError::BufferLength {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert any decoded image to RGB8.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel bytes, row-major RGB.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Resize to a target size, or when no target is given, snap each side
    /// down to the nearest multiple of 32.
    ///
    /// The generator halves the spatial dims twice and doubles them twice, so
    /// sides that are multiples of 32 survive the round trip exactly.
    pub fn resized(&self, target: Option<(u32, u32)>) -> Self {
        let (w, h) = target.unwrap_or((snap32(self.width), snap32(self.height)));
        if (w, h) == (self.width, self.height) {
            return self.clone();
        }
        let img = self.to_rgb_image();
        let resized = image::imageops::resize(&img, w, h, FilterType::Triangle);
        Self {
            width: w,
            height: h,
            data: resized.into_raw(),
        }
    }

    /// Encode and write the frame; the format comes from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let path = path.as_ref();
        self.to_rgb_image()
            .save(path)
            .map_err(|source| CoreError::Encode {
                path: path.to_path_buf(),
                source,
            })
    }

    fn to_rgb_image(&self) -> RgbImage {
        // Length was validated at construction.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Largest multiple of 32 that fits, never below 32.
fn snap32(n: u32) -> u32 {
    (n / 32 * 32).max(32)
}
