// src/engine/mod.rs
//
// Conversion engine: normalized pixel buffer plus the decode, transform and
// encode stages that all operate on it.

pub mod decoder;
pub mod encoder;
pub mod transform;

use crate::error::{ConvertError, Result};
use image::RgbaImage;

/// Maximum allowed dimension (width or height) to prevent DoS attacks
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum total pixels to prevent memory exhaustion
pub const MAX_PIXELS: u64 = 100_000_000;

/// The normalized intermediate representation between decode and encode:
/// a width × height grid of RGBA8 samples.
///
/// Every decode path converges on this type so downstream stages are
/// format-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer from raw RGBA8 bytes. The byte length must be exactly
    /// `width * height * 4` and the dimensions must be non-zero and within
    /// the global limits.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        if width == 0 || height == 0 {
            return Err(ConvertError::decode_failed(
                "pixel buffer dimensions must be non-zero",
            ));
        }
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ConvertError::decode_failed(format!(
                "pixel buffer size mismatch: expected {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-color buffer, used by capability probes and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self::from_rgba8(width, height, data)
    }

    pub fn from_image(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::from_rgba8(width, height, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// RGBA sample at (x, y). Callers must stay in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        debug_assert!(x < self.width && y < self.height);
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// True when any pixel carries alpha below fully opaque.
    pub fn has_translucency(&self) -> bool {
        self.data.iter().skip(3).step_by(4).any(|&a| a != 255)
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("PixelBuffer invariant guarantees a well-formed RGBA image")
    }

    pub fn into_image(self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data)
            .expect("PixelBuffer invariant guarantees a well-formed RGBA image")
    }
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ConvertError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ConvertError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}
