// src/codecs/bmp.rs
//
// Hand-rolled BMP container writer. The platform has no BMP encoder, so the
// full binary file is built directly from the pixel buffer:
//
//   14-byte file header   "BM", file size, two reserved words, pixel offset
//   40-byte info header   width, positive height (bottom-up rows), 1 plane,
//                         24 bpp, BI_RGB, image size, 2835 ppm both axes,
//                         no palette, no important-colors count
//   pixel array           rows bottom-to-top, BGR per pixel, each row padded
//                         with zero bytes to a 4-byte boundary
//
// Alpha cannot be represented at 24 bpp; non-opaque pixels are flattened
// against the configured background.

use crate::engine::transform::composite_over;
use crate::engine::PixelBuffer;

const FILE_HEADER_SIZE: usize = 14;
const INFO_HEADER_SIZE: usize = 40;
const BYTES_PER_PIXEL: usize = 3;

/// Pixels-per-meter resolution written into the info header (72 DPI).
const RESOLUTION_PPM: i32 = 2835;

/// Padded byte width of one pixel row.
pub fn row_size(width: u32) -> usize {
    (width as usize * BYTES_PER_PIXEL + 3) & !3
}

/// Encode the buffer as a 24-bit bottom-up BMP file. Returns the file bytes
/// and whether any pixel had to be flattened against `background`.
pub fn encode(pixels: &PixelBuffer, background: [u8; 3]) -> (Vec<u8>, bool) {
    let width = pixels.width();
    let height = pixels.height();

    let row_size = row_size(width);
    let pixel_array_size = row_size * height as usize;
    let pixel_data_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
    let file_size = pixel_data_offset + pixel_array_size;

    let mut out = Vec::with_capacity(file_size);

    // File header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(pixel_data_offset as u32).to_le_bytes());

    // Info header (BITMAPINFOHEADER)
    out.extend_from_slice(&(INFO_HEADER_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    // Positive height selects bottom-up row order.
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_array_size as u32).to_le_bytes());
    out.extend_from_slice(&RESOLUTION_PPM.to_le_bytes());
    out.extend_from_slice(&RESOLUTION_PPM.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    debug_assert_eq!(out.len(), pixel_data_offset);

    let padding = row_size - width as usize * BYTES_PER_PIXEL;
    let mut had_alpha = false;

    for y in (0..height).rev() {
        for x in 0..width {
            let rgba = pixels.pixel(x, y);
            let [r, g, b] = if rgba[3] == 255 {
                [rgba[0], rgba[1], rgba[2]]
            } else {
                had_alpha = true;
                composite_over(background, rgba)
            };
            out.push(b);
            out.push(g);
            out.push(r);
        }
        out.extend(std::iter::repeat(0u8).take(padding));
    }

    debug_assert_eq!(out.len(), file_size);
    (out, had_alpha)
}
