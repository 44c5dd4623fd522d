//! Decoding of source images and reduction to the grayscale analysis grid.

use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};

use crate::error::DecodeError;

pub const GRID_WIDTH: u32 = 9;
pub const GRID_HEIGHT: u32 = 8;

/// Decode JPEG or PNG bytes into premultiplied RGBA.
///
/// The container is identified from the byte signature only.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    let format = image::guess_format(bytes)
        .map_err(|_| DecodeError::new("unrecognized image signature"))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png => {}
        other => {
            return Err(DecodeError::new(format!(
                "unsupported image format: {other:?}"
            )))
        }
    }

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::new(e.to_string()))?;
    let mut rgba = image.to_rgba8();
    premultiply(&mut rgba);
    Ok(rgba)
}

/// Decode `bytes` and reduce them to the grid the fingerprint is taken from.
pub fn normalize(bytes: &[u8]) -> Result<GrayImage, DecodeError> {
    decode(bytes).map(|image| analysis_grid(&image))
}

/// Downsample to 9x8 and convert to grayscale.
///
/// Sources that are already at most 9 wide or 8 high are converted at their
/// native size.
pub fn analysis_grid(image: &RgbaImage) -> GrayImage {
    if image.width() <= GRID_WIDTH || image.height() <= GRID_HEIGHT {
        to_gray(image)
    } else {
        to_gray(&box_resize(image, GRID_WIDTH, GRID_HEIGHT))
    }
}

pub fn to_gray(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, _]) = *image.get_pixel(x, y);
        Luma([luma(r, g, b)])
    })
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) as u8
}

// 16-bit premultiply, truncated back to 8 bits.
fn premultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = &mut pixel.0;
        if *a == u8::MAX {
            continue;
        }
        let alpha = *a as u64 * 257;
        for c in [r, g, b] {
            *c = ((*c as u64 * 257 * alpha / 0xffff) >> 8) as u8;
        }
    }
}

/// Area-average resize.
///
/// Each destination cell averages the `trunc(block) x trunc(block)` source
/// pixels starting at the accumulated fractional offset of that cell. The
/// rounding of those offsets is part of the fingerprint format.
fn box_resize(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (src_width, src_height) = src.dimensions();
    let block_width = src_width as f64 / width as f64;
    let block_height = src_height as f64 / height as f64;

    let mut out = RgbaImage::new(width, height);

    let mut src_y = 0.0;
    for y in 0..height {
        let mut src_x = 0.0;
        for x in 0..width {
            let mut sum = [0u64; 3];
            let mut count = 0u64;

            for by in 0..block_height as u32 {
                let sy = (src_y as u32 + by).min(src_height - 1);
                for bx in 0..block_width as u32 {
                    let sx = (src_x as u32 + bx).min(src_width - 1);
                    let Rgba([r, g, b, _]) = *src.get_pixel(sx, sy);
                    sum[0] += r as u64;
                    sum[1] += g as u64;
                    sum[2] += b as u64;
                    count += 1;
                }
            }

            if count > 0 {
                out.put_pixel(
                    x,
                    y,
                    Rgba([
                        (sum[0] / count) as u8,
                        (sum[1] / count) as u8,
                        (sum[2] / count) as u8,
                        u8::MAX,
                    ]),
                );
            }
            src_x += block_width;
        }
        src_y += block_height;
    }

    out
}
