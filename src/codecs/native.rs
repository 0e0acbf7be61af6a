// src/codecs/native.rs
//
// Default PlatformCodec backed by the in-process codec stack:
// JPEG via mozjpeg, PNG via zune-png (decode) and image+oxipng (encode),
// WEBP via libwebp, everything else via the image crate.

use crate::codecs::{EncodedImage, PlatformCodec};
use crate::engine::{check_dimensions, PixelBuffer};
use crate::error::{ConvertError, Result};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use mozjpeg::{ColorSpace as JpegColorSpace, Compress, Decompress, ScanMode};
use std::io::Cursor;
use tracing::debug;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

/// Scale pipeline quality ([0.1, 1.0]) to the 0-100 range codec libraries
/// expect.
fn quality_percent(quality: f32) -> f32 {
    let q = if quality.is_finite() { quality } else { 0.85 };
    (q.clamp(0.1, 1.0) * 100.0).round()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformCodec for NativeCodec {
    fn decode_raster(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        let detected = image::guess_format(bytes).ok();
        debug!(format = ?detected, len = bytes.len(), "native decode");
        let img = match detected {
            Some(image::ImageFormat::Jpeg) => decode_jpeg_mozjpeg(bytes)?,
            Some(image::ImageFormat::Png) => decode_png_zune(bytes)?,
            Some(image::ImageFormat::WebP) => decode_webp_libwebp(bytes)?,
            _ => decode_with_image_crate(bytes)?,
        };
        check_dimensions(img.width(), img.height())?;
        PixelBuffer::from_image(img.into_rgba8())
    }

    fn encode_raster(
        &self,
        pixels: &PixelBuffer,
        media_type: &str,
        quality: f32,
    ) -> Result<EncodedImage> {
        let bytes = match media_type {
            "image/png" => encode_png(pixels)?,
            "image/jpeg" => encode_jpeg_mozjpeg(pixels, quality)?,
            "image/webp" => encode_webp_libwebp(pixels, quality)?,
            "image/avif" => encode_avif(pixels, quality)?,
            other => return Err(ConvertError::unsupported_format(other.to_string())),
        };
        Ok(EncodedImage {
            bytes,
            media_type: media_type.to_string(),
        })
    }

    fn probe_encode(&self, media_type: &str) -> bool {
        let probe = match PixelBuffer::solid(1, 1, [0, 0, 0, 255]) {
            Ok(buf) => buf,
            Err(_) => return false,
        };
        match self.encode_raster(&probe, media_type, 0.85) {
            Ok(encoded) => encoded.media_type == media_type,
            Err(_) => false,
        }
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo).
fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<DynamicImage> {
    if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
        return Err(ConvertError::decode_failed(
            "mozjpeg: missing JPEG EOI marker",
        ));
    }

    let decompress = Decompress::new_mem(data).map_err(|e| {
        ConvertError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
    })?;

    let mut decompress = decompress
        .rgb()
        .map_err(|e| ConvertError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}")))?;

    let width = decompress.width();
    let height = decompress.height();
    check_dimensions(width as u32, height as u32)?;

    let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
        ConvertError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
    })?;

    let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();
    let rgb_image = RgbImage::from_raw(width as u32, height as u32, flat_pixels).ok_or_else(
        || ConvertError::decode_failed("mozjpeg: failed to create image from raw data"),
    )?;

    Ok(DynamicImage::ImageRgb8(rgb_image))
}

/// Decode PNG using zune-png. 16-bit inputs are stripped down to 8-bit.
fn decode_png_zune(data: &[u8]) -> Result<DynamicImage> {
    let options = DecoderOptions::default().png_set_strip_to_8bit(true);
    let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
    let pixels = decoder
        .decode()
        .map_err(|e| ConvertError::decode_failed(format!("png: decode failed: {e}")))?;

    let info = decoder
        .info()
        .ok_or_else(|| ConvertError::decode_failed("png: missing header info"))?;

    let width = info.width as u32;
    let height = info.height as u32;
    check_dimensions(width, height)?;

    let buf = match pixels {
        zune_core::result::DecodingResult::U8(v) => v,
        _ => {
            return Err(ConvertError::decode_failed(
                "png: unexpected non-U8 pixel buffer",
            ))
        }
    };

    let colorspace = decoder
        .colorspace()
        .ok_or_else(|| ConvertError::decode_failed("png: missing colorspace"))?;

    let img = match colorspace {
        ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build RGB image"))?,
        ColorSpace::RGBA | ColorSpace::YCbCr | ColorSpace::BGRA | ColorSpace::ARGB => {
            RgbaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| ConvertError::decode_failed("png: failed to build RGBA image"))?
        }
        ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build Luma image"))?,
        ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageLumaA8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build LumaA image"))?,
        other => {
            return Err(ConvertError::decode_failed(format!(
                "png: unsupported colorspace {other:?}"
            )))
        }
    };

    Ok(img)
}

/// Decode WebP using libwebp. Falls back to the image crate for animated
/// WebP (first frame).
fn decode_webp_libwebp(data: &[u8]) -> Result<DynamicImage> {
    let features = BitstreamFeatures::new(data)
        .ok_or_else(|| ConvertError::decode_failed("webp: failed to read bitstream features"))?;

    if features.has_animation() {
        return image::load_from_memory(data).map_err(|e| {
            ConvertError::decode_failed(format!("webp (animated) decode failed: {e}"))
        });
    }

    check_dimensions(features.width(), features.height())?;

    let decoder = WebPDecoder::new(data);
    let decoded = decoder
        .decode()
        .ok_or_else(|| ConvertError::decode_failed("webp: decode failed"))?;

    Ok(decoded.to_image())
}

/// Decode the remaining formats (GIF/BMP/ICO/TIFF/AVIF when available)
/// through the image crate.
fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| ConvertError::decode_failed(format!("decode failed: {e}")))
}

/// Encode PNG via the image crate, then recompress losslessly with oxipng.
fn encode_png(pixels: &PixelBuffer) -> Result<Vec<u8>> {
    let img = pixels.to_image();
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ConvertError::encode_failed("png", format!("PNG encode failed: {e}")))?;

    let options = oxipng::Options::from_preset(2);
    oxipng::optimize_from_memory(&buf, &options)
        .map_err(|e| ConvertError::encode_failed("png", format!("oxipng optimization failed: {e}")))
}

/// Encode JPEG via mozjpeg. The pipeline flattens alpha before calling this,
/// so the alpha channel is simply dropped here.
fn encode_jpeg_mozjpeg(pixels: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(pixels.to_image()).to_rgb8();
    let (w, h) = rgb.dimensions();
    let data: &[u8] = rgb.as_raw();

    let mut comp = Compress::new(JpegColorSpace::JCS_RGB);
    comp.set_size(w as usize, h as usize);
    comp.set_color_space(JpegColorSpace::JCS_YCbCr);
    comp.set_quality(quality_percent(quality));
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_optimize_scans(true);
    comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

    let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
    let mut output = Vec::with_capacity(estimated_size);

    let mut writer = comp.start_compress(&mut output).map_err(|e| {
        ConvertError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
    })?;

    let stride = w as usize * 3;
    for row in data.chunks(stride) {
        writer.write_scanlines(row).map_err(|e| {
            ConvertError::encode_failed(
                "jpeg",
                format!("mozjpeg: failed to write scanlines: {e:?}"),
            )
        })?;
    }

    writer.finish().map_err(|e| {
        ConvertError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
    })?;

    Ok(output)
}

/// Encode WebP via libwebp with a balanced advanced configuration.
fn encode_webp_libwebp(pixels: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
    let encoder = webp::Encoder::from_rgba(pixels.data(), pixels.width(), pixels.height());

    let mut config = webp::WebPConfig::new()
        .map_err(|_| ConvertError::encode_failed("webp", "failed to create WebPConfig"))?;

    let q = quality_percent(quality);
    config.quality = q;
    // Method 4 / single pass / no preprocessing: balanced speed-quality
    // trade-off.
    config.method = 4;
    config.pass = 1;
    config.preprocessing = 0;
    config.autofilter = 1;
    config.filter_strength = if q >= 80.0 {
        20
    } else if q >= 60.0 {
        30
    } else {
        40
    };

    let mem = encoder
        .encode_advanced(&config)
        .map_err(|e| ConvertError::encode_failed("webp", format!("WebP encode failed: {e:?}")))?;

    Ok(mem.to_vec())
}

/// Encode AVIF via the image crate's rav1e-backed encoder.
#[cfg(feature = "avif")]
fn encode_avif(pixels: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
    use image::codecs::avif::AvifEncoder;

    let q = quality_percent(quality) as u8;
    // Speed bands mirror the quality-to-speed mapping used for the other
    // lossy targets: higher quality encodes slower.
    let speed = if q >= 85 {
        6
    } else if q >= 70 {
        7
    } else if q >= 50 {
        8
    } else {
        9
    };

    let mut buf = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut buf, speed, q.max(1));
    let img = pixels.to_image();
    img.write_with_encoder(encoder)
        .map_err(|e| ConvertError::encode_failed("avif", format!("AVIF encode failed: {e}")))?;
    Ok(buf)
}

/// Without the `avif` feature this platform has no AVIF encoder; the probe
/// reports it unsupported and the queue fails such items before decode.
#[cfg(not(feature = "avif"))]
fn encode_avif(_pixels: &PixelBuffer, _quality: f32) -> Result<Vec<u8>> {
    Err(ConvertError::unsupported_capability("AVIF"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_test_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_png_produces_rgba_buffer() {
        let codec = NativeCodec::new();
        let png = encode_test_png(3, 2, [10, 20, 30, 255]);
        let buf = codec.decode_raster(&png).unwrap();
        assert_eq!((buf.width(), buf.height()), (3, 2));
        assert_eq!(buf.pixel(0, 0), [10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_jpeg_routes_to_mozjpeg() {
        let codec = NativeCodec::new();
        let img = RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let buf = codec.decode_raster(&jpeg).unwrap();
        assert_eq!((buf.width(), buf.height()), (4, 4));
        // Lossy round trip; stay loose.
        let [r, g, b, a] = buf.pixel(0, 0);
        assert!(r > 150 && g > 50 && b < 120);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = NativeCodec::new();
        assert!(codec.decode_raster(b"not an image at all").is_err());
    }

    #[test]
    fn test_encode_png_round_trips() {
        let codec = NativeCodec::new();
        let buf = PixelBuffer::solid(5, 4, [1, 2, 3, 255]).unwrap();
        let encoded = codec.encode_raster(&buf, "image/png", 0.85).unwrap();
        assert_eq!(encoded.media_type, "image/png");

        let back = codec.decode_raster(&encoded.bytes).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn test_encode_jpeg_produces_valid_jpeg() {
        let codec = NativeCodec::new();
        let buf = PixelBuffer::solid(8, 8, [128, 128, 128, 255]).unwrap();
        let encoded = codec.encode_raster(&buf, "image/jpeg", 0.85).unwrap();
        assert_eq!(&encoded.bytes[0..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded.bytes[encoded.bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_webp_produces_riff_container() {
        let codec = NativeCodec::new();
        let buf = PixelBuffer::solid(8, 8, [40, 80, 120, 255]).unwrap();
        let encoded = codec.encode_raster(&buf, "image/webp", 0.6).unwrap();
        assert_eq!(&encoded.bytes[0..4], b"RIFF");
        assert_eq!(&encoded.bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_unknown_media_type_fails() {
        let codec = NativeCodec::new();
        let buf = PixelBuffer::solid(1, 1, [0, 0, 0, 255]).unwrap();
        assert!(matches!(
            codec.encode_raster(&buf, "image/xpm", 0.85),
            Err(ConvertError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_probe_core_targets() {
        let codec = NativeCodec::new();
        assert!(codec.probe_encode("image/png"));
        assert!(codec.probe_encode("image/jpeg"));
        assert!(codec.probe_encode("image/webp"));
        assert!(!codec.probe_encode("image/xpm"));
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn test_probe_avif_unsupported_without_feature() {
        let codec = NativeCodec::new();
        assert!(!codec.probe_encode("image/avif"));
    }

    #[test]
    fn test_rasterize_vector_default_is_unsupported() {
        let codec = NativeCodec::new();
        assert!(codec.rasterize_vector("<svg/>", 10, 10).is_err());
    }

    #[test]
    fn test_quality_percent_clamps() {
        assert_eq!(quality_percent(0.85), 85.0);
        assert_eq!(quality_percent(2.0), 100.0);
        assert_eq!(quality_percent(0.0), 10.0);
        assert_eq!(quality_percent(f32::NAN), 85.0);
    }
}
