//! Convenience helpers for moving pixels between image files and the
//! in-memory host.
//!
//! Available when the `image-io` feature is enabled.

use crate::host::memory::{MemoryCanvas, MemorySelection};
use crate::plan::{ChannelIndexSource, ChannelLayout};
use crate::util::{FilterError, FilterResult};
use image::{Pixel, RgbaImage};
use std::path::Path;

fn image_error(err: image::ImageError) -> FilterError {
    FilterError::ImageIo {
        reason: err.to_string(),
    }
}

fn dimensions(img: &RgbaImage) -> FilterResult<(i32, i32)> {
    let width = i32::try_from(img.width()).unwrap_or(0);
    let height = i32::try_from(img.height()).unwrap_or(0);
    if width <= 0 || height <= 0 {
        return Err(FilterError::InvalidDimensions { width, height });
    }
    Ok((width, height))
}

fn check_size(canvas: &MemoryCanvas, img: &RgbaImage) -> FilterResult<()> {
    let (width, height) = dimensions(img)?;
    if (width, height) != (canvas.width(), canvas.height()) {
        return Err(FilterError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Bytes per image pixel; the gray and RGB layouts need at least one.
fn image_pixel_bytes(canvas: &MemoryCanvas) -> FilterResult<usize> {
    let pixel_bytes = canvas.pixel_bytes();
    if pixel_bytes == 0 {
        return Err(FilterError::InvalidStride {
            width: canvas.width() as usize,
            row_bytes: 0,
            pixel_bytes,
        });
    }
    Ok(pixel_bytes)
}

/// Host channel order, checked against the pixel stride.
fn rgb_offsets(canvas: &MemoryCanvas, pixel_bytes: usize) -> FilterResult<[usize; 3]> {
    let layout = canvas.layout();
    canvas
        .rgb_channel_index()
        .filter(|index| index.iter().all(|&c| c < pixel_bytes))
        .ok_or(FilterError::ChannelIndexQueryFailed(layout))
}

/// Loads an image from disk as 8-bit RGBA.
pub fn load_rgba<P: AsRef<Path>>(path: P) -> FilterResult<RgbaImage> {
    let img = image::open(path).map_err(image_error)?;
    Ok(img.to_rgba8())
}

/// Saves an RGBA image; the format follows the file extension.
pub fn save_rgba<P: AsRef<Path>>(img: &RgbaImage, path: P) -> FilterResult<()> {
    img.save(path).map_err(image_error)
}

/// Loads a selection mask. Luma is the per-pixel weight.
pub fn load_selection<P: AsRef<Path>>(path: P) -> FilterResult<MemorySelection> {
    let img = image::open(path).map_err(image_error)?.to_luma8();
    let width = i32::try_from(img.width()).unwrap_or(0);
    let height = i32::try_from(img.height()).unwrap_or(0);
    MemorySelection::new(width, height, img.into_raw())
}

/// Creates a zero-filled canvas sized like `img`.
pub fn canvas_for(img: &RgbaImage, layout: ChannelLayout) -> FilterResult<MemoryCanvas> {
    let (width, height) = dimensions(img)?;
    MemoryCanvas::new(layout, width, height)
}

/// Copies `img` into the canvas planes.
///
/// Gray layouts take the luma of each pixel; RGB layouts place red, green and
/// blue at the canvas channel order.
pub fn fill_canvas(canvas: &mut MemoryCanvas, img: &RgbaImage) -> FilterResult<()> {
    check_size(canvas, img)?;
    let layout = canvas.layout();
    let rgb_index = match layout {
        ChannelLayout::Alpha => None,
        ChannelLayout::GrayAlpha => {
            image_pixel_bytes(canvas)?;
            None
        }
        ChannelLayout::RgbAlpha => Some(rgb_offsets(canvas, image_pixel_bytes(canvas)?)?),
        other => return Err(FilterError::UnsupportedChannelLayout(other)),
    };
    let pixel_bytes = canvas.pixel_bytes();

    for (dst, px) in canvas.alpha_mut().iter_mut().zip(img.pixels()) {
        *dst = px[3];
    }
    if layout == ChannelLayout::Alpha {
        return Ok(());
    }
    let image = canvas.image_mut();
    for (dst, px) in image.chunks_exact_mut(pixel_bytes).zip(img.pixels()) {
        match rgb_index {
            Some(index) => {
                for (channel, &offset) in index.iter().enumerate() {
                    dst[offset] = px[channel];
                }
            }
            None => dst[0] = px.to_luma()[0],
        }
    }
    Ok(())
}

/// Writes the canvas planes back into `img`.
///
/// Alpha layouts only replace the alpha channel; gray layouts write the gray
/// value to red, green and blue.
pub fn write_canvas(canvas: &MemoryCanvas, img: &mut RgbaImage) -> FilterResult<()> {
    check_size(canvas, img)?;
    let layout = canvas.layout();
    let rgb_index = match layout {
        ChannelLayout::Alpha => None,
        ChannelLayout::GrayAlpha => {
            image_pixel_bytes(canvas)?;
            None
        }
        ChannelLayout::RgbAlpha => Some(rgb_offsets(canvas, image_pixel_bytes(canvas)?)?),
        other => return Err(FilterError::UnsupportedChannelLayout(other)),
    };

    for (px, &alpha) in img.pixels_mut().zip(canvas.alpha()) {
        px[3] = alpha;
    }
    if layout == ChannelLayout::Alpha {
        return Ok(());
    }
    let pixels = canvas.image().chunks_exact(canvas.pixel_bytes());
    for (px, src) in img.pixels_mut().zip(pixels) {
        match rgb_index {
            Some(index) => {
                for (channel, &offset) in index.iter().enumerate() {
                    px[channel] = src[offset];
                }
            }
            None => {
                px[0] = src[0];
                px[1] = src[0];
                px[2] = src[0];
            }
        }
    }
    Ok(())
}
