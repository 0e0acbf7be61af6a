// src/engine/transform.rs
//
// Target-size arithmetic, Lanczos3 resampling, and alpha flattening.

use crate::engine::PixelBuffer;
use crate::error::{ConvertError, Result};
use crate::settings::ConversionSettings;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};

/// Result of target-size computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Compute the output dimensions for a source image under the current
/// settings.
///
/// - Resize disabled, or both targets absent/zero: source size, unresized.
/// - Aspect lock off: each axis independently takes its requested value when
///   positive, else the source value.
/// - Aspect lock on: the given axis wins and the other is derived from the
///   source aspect ratio, rounded to nearest and floored at 1 so degenerate
///   zero-size buffers cannot appear. When both axes are given, width wins.
pub fn compute_target_size(
    src_width: u32,
    src_height: u32,
    settings: &ConversionSettings,
) -> TargetSize {
    let unresized = TargetSize {
        width: src_width,
        height: src_height,
        resized: false,
    };

    if !settings.resize_enabled {
        return unresized;
    }

    let target_w = settings.resize_width.filter(|w| *w > 0);
    let target_h = settings.resize_height.filter(|h| *h > 0);

    if target_w.is_none() && target_h.is_none() {
        return unresized;
    }

    if !settings.lock_aspect {
        return TargetSize {
            width: target_w.unwrap_or(src_width),
            height: target_h.unwrap_or(src_height),
            resized: true,
        };
    }

    let ratio = src_width as f64 / src_height as f64;
    if let Some(w) = target_w {
        let h = ((w as f64 / ratio).round() as u32).max(1);
        TargetSize {
            width: w,
            height: h,
            resized: true,
        }
    } else {
        let h = target_h.expect("one axis is present when the other is absent");
        let w = ((h as f64 * ratio).round() as u32).max(1);
        TargetSize {
            width: w,
            height: h,
            resized: true,
        }
    }
}

fn resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Resample the buffer to the given dimensions with Lanczos3 convolution.
/// Alpha is premultiplied around the resample when any pixel is translucent,
/// so color does not bleed from fully transparent regions.
pub fn resize(pixels: &PixelBuffer, dst_width: u32, dst_height: u32) -> Result<PixelBuffer> {
    if dst_width == 0 || dst_height == 0 {
        return Err(ConvertError::encode_failed(
            "resize",
            "invalid dimensions for resize",
        ));
    }
    if dst_width == pixels.width() && dst_height == pixels.height() {
        return Ok(pixels.clone());
    }

    // Copy into an owned fir image; this also guarantees buffer alignment.
    let mut src_image = fir::images::Image::new(pixels.width(), pixels.height(), PixelType::U8x4);
    src_image.buffer_mut().copy_from_slice(pixels.data());

    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);

    let needs_premultiply = pixels.has_translucency();
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| {
                ConvertError::encode_failed("resize", format!("failed to premultiply alpha: {e}"))
            })?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &resize_options())
        .map_err(|e| ConvertError::encode_failed("resize", format!("fir resize error: {e:?}")))?;

    if needs_premultiply {
        mul_div.divide_alpha_inplace(&mut dst_image).map_err(|e| {
            ConvertError::encode_failed("resize", format!("failed to unpremultiply alpha: {e}"))
        })?;
    }

    PixelBuffer::from_rgba8(dst_width, dst_height, dst_image.into_vec())
}

/// Standard alpha blending of one pixel over an opaque background:
/// `out = round(src * alpha + background * (1 - alpha))` per channel.
pub fn composite_over(background: [u8; 3], rgba: [u8; 4]) -> [u8; 3] {
    let alpha = rgba[3] as f32 / 255.0;
    let inv = 1.0 - alpha;
    let blend = |src: u8, bg: u8| (src as f32 * alpha + bg as f32 * inv).round() as u8;
    [
        blend(rgba[0], background[0]),
        blend(rgba[1], background[1]),
        blend(rgba[2], background[2]),
    ]
}

/// Flatten every translucent pixel against the background, producing a fully
/// opaque buffer. Returns whether any pixel actually carried alpha; callers
/// record a warning in that case.
pub fn flatten_alpha(pixels: &PixelBuffer, background: [u8; 3]) -> (PixelBuffer, bool) {
    let mut had_alpha = false;
    let mut data = Vec::with_capacity(pixels.data().len());
    for rgba in pixels.data().chunks_exact(4) {
        if rgba[3] == 255 {
            data.extend_from_slice(rgba);
        } else {
            had_alpha = true;
            let [r, g, b] = composite_over(background, [rgba[0], rgba[1], rgba[2], rgba[3]]);
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    let flattened = PixelBuffer::from_rgba8(pixels.width(), pixels.height(), data)
        .expect("flattening preserves buffer dimensions");
    (flattened, had_alpha)
}

/// Parse a `#rgb` / `#rrggbb` hex color (hash optional). Anything else falls
/// back to white, matching the settings default.
pub fn hex_to_rgb(hex: &str) -> [u8; 3] {
    let raw = hex.trim();
    let normalized = raw.strip_prefix('#').unwrap_or(raw);

    let parse = |s: &str| u8::from_str_radix(s, 16).ok();
    let bytes = normalized.as_bytes();

    if normalized.len() == 3 && normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        let expand = |c: u8| {
            let s = (c as char).to_string();
            parse(&format!("{s}{s}"))
        };
        if let (Some(r), Some(g), Some(b)) = (expand(bytes[0]), expand(bytes[1]), expand(bytes[2]))
        {
            return [r, g, b];
        }
    }

    if normalized.len() == 6 {
        if let (Some(r), Some(g), Some(b)) = (
            parse(&normalized[0..2]),
            parse(&normalized[2..4]),
            parse(&normalized[4..6]),
        ) {
            return [r, g, b];
        }
    }

    [255, 255, 255]
}
