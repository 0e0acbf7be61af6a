// src/engine/encoder.rs
//
// Encode pipeline: apply the target-size rules, route to the right encoder
// for the selected output format, and reject silent container substitution.

use crate::codecs::{bmp, ico, PlatformCodec};
use crate::engine::transform::{compute_target_size, flatten_alpha, hex_to_rgb, resize};
use crate::engine::PixelBuffer;
use crate::error::{ConvertError, Result};
use crate::formats::{build_output_file_name, output_format, OutputFormatKey};
use crate::settings::ConversionSettings;
use tracing::debug;

/// One finished conversion result.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub output_name: String,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
    pub warnings: Vec<String>,
}

/// Encode a decoded buffer under the current settings.
///
/// Resize is applied first so every encoder sees the final dimensions. The
/// codec-backed formats (PNG, JPEG, WebP, AVIF) verify that the container the
/// platform actually produced matches the requested media type; a mismatch is
/// an encode failure, never a silently renamed file. BMP and ICO are built by
/// hand from the buffer.
pub fn encode(
    pixels: &PixelBuffer,
    settings: &ConversionSettings,
    input_name: &str,
    codec: &dyn PlatformCodec,
) -> Result<Encoded> {
    let format = output_format(settings.output_format);
    let target = compute_target_size(pixels.width(), pixels.height(), settings);

    let resized_buf;
    let sized = if target.resized {
        resized_buf = resize(pixels, target.width, target.height)?;
        &resized_buf
    } else {
        pixels
    };

    debug!(
        format = format.label,
        width = sized.width(),
        height = sized.height(),
        resized = target.resized,
        "encoding"
    );

    let mut warnings = Vec::new();
    let quality = settings.effective_quality();
    let background = hex_to_rgb(&settings.background);

    let (bytes, media_type, out_width, out_height) = match settings.output_format {
        OutputFormatKey::Png | OutputFormatKey::Webp | OutputFormatKey::Avif => {
            let encoded = encode_via_codec(codec, sized, format.media_type, quality)?;
            (encoded, format.media_type, sized.width(), sized.height())
        }
        OutputFormatKey::Jpeg => {
            let flat;
            let opaque = if sized.has_translucency() {
                let (buffer, had_alpha) = flatten_alpha(sized, background);
                if had_alpha {
                    warnings.push(
                        "Transparency was flattened against the background color.".to_string(),
                    );
                }
                flat = buffer;
                &flat
            } else {
                sized
            };
            let encoded = encode_via_codec(codec, opaque, format.media_type, quality)?;
            (encoded, format.media_type, opaque.width(), opaque.height())
        }
        OutputFormatKey::Bmp => {
            let (bytes, had_alpha) = bmp::encode(sized, background);
            if had_alpha {
                warnings
                    .push("Transparency was flattened against the background color.".to_string());
            }
            (bytes, format.media_type, sized.width(), sized.height())
        }
        OutputFormatKey::Ico => {
            let shrunk;
            let icon = if sized.width() > ico::MAX_ICON_DIMENSION
                || sized.height() > ico::MAX_ICON_DIMENSION
            {
                let (w, h) = fit_icon_dimensions(sized.width(), sized.height());
                shrunk = resize(sized, w, h)?;
                warnings.push(format!(
                    "Image was downscaled to {w}x{h} to fit the {} pixel icon limit.",
                    ico::MAX_ICON_DIMENSION
                ));
                &shrunk
            } else {
                sized
            };
            if icon.width() != icon.height() {
                warnings.push(
                    "Icon is not square; most consumers expect square icons.".to_string(),
                );
            }
            let png = encode_via_codec(codec, icon, "image/png", quality)?;
            let bytes = ico::wrap_png(&png, icon.width(), icon.height());
            (bytes, format.media_type, icon.width(), icon.height())
        }
    };

    Ok(Encoded {
        bytes,
        media_type: media_type.to_string(),
        output_name: build_output_file_name(input_name, format.extension),
        width: out_width,
        height: out_height,
        resized: target.resized,
        warnings,
    })
}

/// Encode through the platform codec and verify the produced container.
fn encode_via_codec(
    codec: &dyn PlatformCodec,
    pixels: &PixelBuffer,
    media_type: &'static str,
    quality: f32,
) -> Result<Vec<u8>> {
    let encoded = codec.encode_raster(pixels, media_type, quality)?;
    if encoded.media_type != media_type {
        return Err(ConvertError::encode_failed(
            media_type,
            format!(
                "platform substituted {} for the requested container",
                encoded.media_type
            ),
        ));
    }
    if encoded.bytes.is_empty() {
        return Err(ConvertError::encode_failed(
            media_type,
            "platform produced an empty container",
        ));
    }
    Ok(encoded.bytes)
}

/// Proportionally fit oversized dimensions into the icon limit, flooring each
/// axis at one pixel.
fn fit_icon_dimensions(width: u32, height: u32) -> (u32, u32) {
    let limit = ico::MAX_ICON_DIMENSION as f64;
    let scale = (limit / width as f64).min(limit / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, ico::MAX_ICON_DIMENSION);
    let h = ((height as f64 * scale).round() as u32).clamp(1, ico::MAX_ICON_DIMENSION);
    (w, h)
}
