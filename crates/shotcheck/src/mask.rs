//! Blanking of dynamic regions before comparison.
//!
//! Ads, clocks and other volatile content are covered with an opaque fill so
//! they cannot register as differences. The same rectangle set must be applied
//! to both the baseline and the candidate; [`Comparator`](crate::Comparator)
//! always does so.

use crate::raster::{RasterBuffer, CHANNELS};
use crate::region::Rect;
use crate::result::ShotResult;
use image::Rgba;

/// Fill used when the caller does not pick one
pub const DEFAULT_MASK_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Cover each rectangle with `fill`, in order.
///
/// Every rectangle is validated before any pixel is written. Empty rectangles
/// are accepted and change nothing.
///
/// # Errors
///
/// Returns [`ShotError::InvalidRegion`](crate::ShotError::InvalidRegion) if a
/// rectangle extends past the buffer.
pub fn mask(buffer: &RasterBuffer, rects: &[Rect], fill: Rgba<u8>) -> ShotResult<RasterBuffer> {
    let (width, height) = buffer.dimensions();
    for rect in rects {
        rect.check_within(width, height)?;
    }
    if rects.iter().all(Rect::is_empty) {
        return Ok(buffer.clone());
    }

    let stride = width as usize * CHANNELS;
    let mut data = buffer.as_raw().to_vec();
    for rect in rects.iter().filter(|r| !r.is_empty()) {
        let start = rect.x as usize * CHANNELS;
        let end = start + rect.width as usize * CHANNELS;
        for y in rect.y..rect.y + rect.height {
            let row = &mut data[y as usize * stride..(y as usize + 1) * stride];
            for px in row[start..end].chunks_exact_mut(CHANNELS) {
                px.copy_from_slice(&fill.0);
            }
        }
    }
    RasterBuffer::from_raw(width, height, data)
}
