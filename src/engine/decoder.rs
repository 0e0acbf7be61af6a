// src/engine/decoder.rs
//
// Decode pipeline: raw file bytes + detected input format in, normalized
// RGBA8 pixel buffer + advisory warnings out. Every path converges on
// PixelBuffer so the transform and encode stages are format-agnostic.

use crate::codecs::{ExternalCodec, PlatformCodec};
use crate::engine::{check_dimensions, PixelBuffer};
use crate::error::{ConvertError, Result};
use crate::formats::InputFormatKey;
use tracing::debug;

/// Canvas used when an SVG document declares no usable intrinsic size.
pub const SVG_DEFAULT_CANVAS: u32 = 512;

/// Where an SVG's raster size was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgSizeSource {
    Attributes,
    ViewBox,
    Fallback,
}

/// A decoded source image plus the non-fatal warnings gathered on the way.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub pixels: PixelBuffer,
    pub warnings: Vec<String>,
}

/// Decode one source file according to its detected format.
///
/// Per-format policy:
/// - SVG: resolve the intrinsic size (attributes, then viewBox, then the
///   512x512 fallback) and rasterize through the platform hook; always warns
///   that the vector was rasterized.
/// - HEIC/HEIF: external codec; only the first contained image is used.
/// - Everything else: platform raster decode, with advisory warnings for
///   formats whose support is host-dependent. Failures are decode errors,
///   never silent fallbacks.
pub fn decode(
    bytes: &[u8],
    format: InputFormatKey,
    codec: &dyn PlatformCodec,
    external: Option<&dyn ExternalCodec>,
) -> Result<Decoded> {
    debug!(?format, len = bytes.len(), "decoding source");
    match format {
        InputFormatKey::Svg => decode_svg(bytes, codec),
        InputFormatKey::Heic => decode_external(bytes, external),
        _ => {
            let pixels = codec.decode_raster(bytes)?;
            Ok(Decoded {
                pixels,
                warnings: advisory_warnings(format),
            })
        }
    }
}

fn decode_svg(bytes: &[u8], codec: &dyn PlatformCodec) -> Result<Decoded> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ConvertError::decode_failed("SVG document is not valid UTF-8"))?;

    let (width, height, source) = parse_svg_intrinsic_size(text);
    check_dimensions(width, height)?;
    debug!(width, height, ?source, "rasterizing SVG");

    let pixels = codec.rasterize_vector(text, width, height)?;
    Ok(Decoded {
        pixels,
        warnings: vec!["SVG rasterized to a bitmap before conversion.".to_string()],
    })
}

fn decode_external(bytes: &[u8], external: Option<&dyn ExternalCodec>) -> Result<Decoded> {
    let codec = external.ok_or_else(|| {
        ConvertError::decode_failed("no external codec is configured for HEIC/HEIF")
    })?;

    let frames = codec.decode_all(bytes)?;
    let count = frames.len();
    let pixels = frames
        .into_iter()
        .next()
        .ok_or_else(|| ConvertError::decode_failed("HEIC/HEIF decode returned no images"))?;

    let mut warnings = Vec::new();
    if count > 1 {
        warnings.push(
            "HEIC/HEIF contains multiple images; converted using the first frame only."
                .to_string(),
        );
    }
    warnings.push("HEIC/HEIF decoded via an external codec before conversion.".to_string());

    Ok(Decoded { pixels, warnings })
}

/// Advisory warnings attached even on successful decode for formats with
/// known limitations.
fn advisory_warnings(format: InputFormatKey) -> Vec<String> {
    let mut warnings = Vec::new();
    match format {
        InputFormatKey::Gif => {
            warnings.push("GIF converted using the first frame only.".to_string())
        }
        InputFormatKey::Tiff => {
            warnings.push("TIFF decoding depends on platform support.".to_string())
        }
        InputFormatKey::Ico => {
            warnings.push("ICO decoding depends on platform support.".to_string())
        }
        InputFormatKey::Avif => {
            warnings.push("AVIF decoding depends on platform support.".to_string())
        }
        _ => {}
    }
    warnings
}

/// Resolve the raster size for an SVG document: positive width/height
/// attributes win, then the viewBox extent, then the fixed default canvas.
pub fn parse_svg_intrinsic_size(svg: &str) -> (u32, u32, SvgSizeSource) {
    let width = attribute_value(svg, "width").and_then(parse_svg_length);
    let height = attribute_value(svg, "height").and_then(parse_svg_length);

    if let (Some(w), Some(h)) = (width, height) {
        return (w, h, SvgSizeSource::Attributes);
    }

    if let Some(view_box) = attribute_value(svg, "viewBox") {
        let numbers: Vec<f64> = view_box
            .split_whitespace()
            .filter_map(|n| n.parse::<f64>().ok())
            .collect();
        if numbers.len() == 4 && numbers[2] > 0.0 && numbers[3] > 0.0 {
            return (
                numbers[2].round() as u32,
                numbers[3].round() as u32,
                SvgSizeSource::ViewBox,
            );
        }
    }

    (SVG_DEFAULT_CANVAS, SVG_DEFAULT_CANVAS, SvgSizeSource::Fallback)
}

/// First quoted value of a bare attribute, rejecting hyphen/colon-prefixed
/// names so `stroke-width` never matches `width`.
fn attribute_value(svg: &str, name: &str) -> Option<String> {
    let bytes = svg.as_bytes();
    let mut start = 0;
    while let Some(pos) = svg[start..].find(name) {
        let idx = start + pos;
        start = idx + name.len();

        if idx > 0 {
            let prev = bytes[idx - 1];
            if prev.is_ascii_alphanumeric() || prev == b'-' || prev == b':' {
                continue;
            }
        }

        let rest = svg[idx + name.len()..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(quote) = rest.chars().next() else {
            continue;
        };
        if quote != '"' && quote != '\'' {
            continue;
        }
        let rest = &rest[1..];
        if let Some(end) = rest.find(quote) {
            return Some(rest[..end].to_string());
        }
    }
    None
}

/// Parse an SVG length like `640` or `640px`; only positive finite values
/// count.
fn parse_svg_length(value: String) -> Option<u32> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    let parsed: f64 = trimmed.parse().ok()?;
    if parsed.is_finite() && parsed > 0.0 {
        Some(parsed.round().max(1.0) as u32)
    } else {
        None
    }
}
