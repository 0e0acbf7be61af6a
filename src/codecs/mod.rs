// src/codecs/mod.rs
//
// Codec seams and implementations.
//
// The pipeline never talks to a concrete codec library directly: standard
// raster formats go through the `PlatformCodec` trait, formats the platform
// cannot decode (HEIC/HEIF) go through `ExternalCodec`. `NativeCodec` is the
// default `PlatformCodec` backed by mozjpeg / zune-png / libwebp / image.
// The two container formats no platform encodes — BMP and ICO — are built by
// hand in `bmp` and `ico`.

pub mod bmp;
pub mod ico;
mod native;

pub use native::NativeCodec;

use crate::engine::PixelBuffer;
use crate::error::{ConvertError, Result};

/// An encoded container returned by a codec: the raw bytes plus the media
/// type of the container that was ACTUALLY produced. Platforms are known to
/// silently substitute a fallback container (typically PNG) for unsupported
/// lossy targets; the encode pipeline compares this field against the
/// requested type and rejects substitutions.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Narrow contract over the platform's raster primitives.
pub trait PlatformCodec {
    /// Decode raster bytes into the normalized RGBA8 buffer.
    fn decode_raster(&self, bytes: &[u8]) -> Result<PixelBuffer>;

    /// Encode the buffer into the requested container. `quality` is in
    /// [0.1, 1.0] and only meaningful for lossy containers.
    fn encode_raster(
        &self,
        pixels: &PixelBuffer,
        media_type: &str,
        quality: f32,
    ) -> Result<EncodedImage>;

    /// Probe whether this platform can produce the given container.
    /// Implementations encode a 1×1 buffer and verify the result's declared
    /// media type; support is a property of the runtime, so callers must not
    /// cache the answer across sessions.
    fn probe_encode(&self, media_type: &str) -> bool;

    /// Rasterize an SVG document at the given pixel size. Hosts without a
    /// vector rasterizer keep the default body: SVG decode then fails with a
    /// decode error rather than a silent fallback.
    fn rasterize_vector(&self, _svg: &str, _width: u32, _height: u32) -> Result<PixelBuffer> {
        Err(ConvertError::decode_failed(
            "no vector rasterizer is available on this platform",
        ))
    }
}

/// External decode capability for formats with no platform support.
/// A source may contain multiple images; the decode pipeline uses the first
/// and warns about the rest.
pub trait ExternalCodec {
    fn decode_all(&self, bytes: &[u8]) -> Result<Vec<PixelBuffer>>;
}
