//! Pixel conversion from native video frames to packed RGBA

use crate::error::{Error, Result};
use crate::ndi::fourcc;
use crate::types::{Image, PixelLayout};

/// Map a frame FourCC to a 4-channel 8-bit layout
pub fn layout_from_fourcc(code: i32) -> Option<PixelLayout> {
    match code {
        fourcc::RGBA => Some(PixelLayout::Rgba),
        fourcc::RGBX => Some(PixelLayout::Rgbx),
        fourcc::BGRA => Some(PixelLayout::Bgra),
        fourcc::BGRX => Some(PixelLayout::Bgrx),
        _ => None,
    }
}

/// Copy strided rows into a packed, opaque-where-needed RGBA image.
///
/// Red and blue are swapped for blue-first layouts; alpha is forced to 255 for X layouts.
pub fn pack_rows(
    src: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    layout: PixelLayout,
) -> Result<Image> {
    let row_bytes = width as usize * layout.bytes_per_pixel();
    if stride < row_bytes {
        return Err(Error::PixelConversion(format!(
            "Stride {} shorter than row ({} bytes)",
            stride, row_bytes
        )));
    }
    let needed = if height == 0 {
        0
    } else {
        stride * (height as usize - 1) + row_bytes
    };
    if src.len() < needed {
        return Err(Error::PixelConversion(format!(
            "Frame buffer too small: {} < {}",
            src.len(),
            needed
        )));
    }

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        data.extend_from_slice(&src[start..start + row_bytes]);
    }

    if layout.is_blue_first() {
        bgra_rgba_swap(&mut data);
    }
    if !layout.has_alpha() {
        force_opaque(&mut data);
    }

    Ok(Image::from_data(data, width, height, PixelLayout::Rgba))
}

/// Convert one captured frame's pixels into a display image
pub fn frame_to_image(
    pixels: &[u8],
    width: i32,
    height: i32,
    stride: i32,
    code: i32,
) -> Result<Image> {
    let layout = layout_from_fourcc(code).ok_or_else(|| {
        let bytes = code.to_le_bytes();
        Error::PixelConversion(format!(
            "Unsupported FourCC {}",
            String::from_utf8_lossy(&bytes)
        ))
    })?;
    if width <= 0 || height <= 0 || stride <= 0 {
        return Err(Error::PixelConversion(format!(
            "Invalid frame geometry {}x{} stride {}",
            width, height, stride
        )));
    }

    pack_rows(pixels, width as u32, height as u32, stride as usize, layout)
}

fn bgra_rgba_swap(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.swap(0, 2); // Swap B and R
    }
}

fn force_opaque(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        chunk[3] = 0xFF;
    }
}
