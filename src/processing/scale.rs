//! Frame scaling

use crate::error::{Error, Result};
use crate::types::{Image, Resolution};

/// Scale packed 4-byte pixels with nearest-neighbor sampling
pub fn scale_frame(
    input: &[u8],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>> {
    let src_w = src_width as usize;
    let src_h = src_height as usize;
    let dst_w = dst_width as usize;
    let dst_h = dst_height as usize;
    let bpp = 4;

    if input.len() < src_w * src_h * bpp {
        return Err(Error::Scaling("Input buffer too small".into()));
    }

    if src_width == dst_width && src_height == dst_height {
        return Ok(input[..src_w * src_h * bpp].to_vec());
    }

    if src_w == 0 || src_h == 0 {
        return Err(Error::Scaling(format!(
            "Cannot scale empty {}x{} frame",
            src_width, src_height
        )));
    }

    let mut output = vec![0u8; dst_w * dst_h * bpp];

    for y in 0..dst_h {
        let src_y = y * src_h / dst_h;
        for x in 0..dst_w {
            let src_x = x * src_w / dst_w;

            let src_idx = (src_y * src_w + src_x) * bpp;
            let dst_idx = (y * dst_w + x) * bpp;

            output[dst_idx..dst_idx + bpp].copy_from_slice(&input[src_idx..src_idx + bpp]);
        }
    }

    Ok(output)
}

/// Scale `image` to the largest size that fits `region` with its aspect ratio kept
pub fn scale_to_fit(image: &Image, region: Resolution) -> Result<Image> {
    let target = image.resolution().fit_within(region);
    if target == image.resolution() {
        return Ok(image.clone());
    }

    let data = scale_frame(
        &image.data,
        image.width,
        image.height,
        target.width,
        target.height,
    )?;
    Ok(Image::from_data(data, target.width, target.height, image.layout))
}

impl Image {
    /// See [`scale_to_fit`]
    pub fn scaled_to_fit(&self, region: Resolution) -> Result<Image> {
        scale_to_fit(self, region)
    }
}
