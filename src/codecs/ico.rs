// src/codecs/ico.rs
//
// Hand-rolled single-frame ICO container. The payload is a PNG produced by
// the platform codec; this module only builds the wrapper:
//
//   6-byte header         reserved=0, type=1 (icon), image count=1
//   16-byte directory     width/height as raw bytes (256 encoded as 0 per
//                         container convention), palette count, reserved,
//                         color planes, bit count, payload size, payload
//                         offset
//   payload               the embedded PNG bytes

/// Largest dimension the icon directory can express.
pub const MAX_ICON_DIMENSION: u32 = 256;

const HEADER_SIZE: usize = 6;
const ENTRY_SIZE: usize = 16;

/// Dimension byte for the directory entry: the literal value 256 is encoded
/// as 0. Callers must have downscaled to at most 256 beforehand.
fn dimension_byte(value: u32) -> u8 {
    debug_assert!(value >= 1 && value <= MAX_ICON_DIMENSION);
    if value == MAX_ICON_DIMENSION {
        0
    } else {
        value as u8
    }
}

/// Wrap PNG bytes in a one-entry icon container.
pub fn wrap_png(png: &[u8], width: u32, height: u32) -> Vec<u8> {
    let image_offset = HEADER_SIZE + ENTRY_SIZE;
    let mut out = Vec::with_capacity(image_offset + png.len());

    // Header
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());

    // Directory entry
    out.push(dimension_byte(width));
    out.push(dimension_byte(height));
    out.push(0); // palette colors (none)
    out.push(0); // reserved
    out.extend_from_slice(&1u16.to_le_bytes()); // color planes
    out.extend_from_slice(&32u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&(png.len() as u32).to_le_bytes());
    out.extend_from_slice(&(image_offset as u32).to_le_bytes());

    debug_assert_eq!(out.len(), image_offset);
    out.extend_from_slice(png);
    out
}
