//! Video processing module
//!
//! Provides frame processing for display:
//! - Pixel layout conversion to packed RGBA
//! - Aspect-preserving scaling

mod convert;
mod scale;

pub use convert::{frame_to_image, layout_from_fourcc, pack_rows};
pub use scale::{scale_frame, scale_to_fit};

use crate::error::Result;
use crate::ndi::VideoFrameV2;
use crate::types::{Image, Resolution};

/// Convert a captured frame and optionally fit it into a display region.
///
/// Returns `Ok(None)` for a frame without a picture.
///
/// # Safety
///
/// `frame` must have been filled by a runtime capture and not yet freed.
pub unsafe fn process_frame(
    frame: &VideoFrameV2,
    display: Option<Resolution>,
) -> Result<Option<Image>> {
    let Some(pixels) = frame.pixels() else {
        return Ok(None);
    };

    let image = frame_to_image(
        pixels,
        frame.xres,
        frame.yres,
        frame.line_stride_in_bytes,
        frame.fourcc,
    )?;

    match display {
        Some(region) => scale_to_fit(&image, region).map(Some),
        None => Ok(Some(image)),
    }
}
