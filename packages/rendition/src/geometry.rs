//! Bounding-box geometry for renditions.

use std::cmp::Ordering;

use crate::error::{RenditionError, Result};

/// Compute the output size that fits a `master_width` x `master_height`
/// image into a `size` x `size` box while keeping its aspect ratio.
///
/// The larger side maps exactly to `size`; the smaller side is scaled by the
/// same ratio and truncated toward zero, so it can come out as `0` for very
/// elongated images.
pub fn resolve(master_width: u32, master_height: u32, size: u32) -> Result<(u32, u32)> {
    if master_width == 0 || master_height == 0 || size == 0 {
        return Err(RenditionError::InvalidDimensions {
            width: master_width,
            height: master_height,
            size,
        });
    }

    let dims = match master_width.cmp(&master_height) {
        Ordering::Greater => (size, scale(size, master_height, master_width)),
        Ordering::Less => (scale(size, master_width, master_height), size),
        Ordering::Equal => (size, size),
    };

    Ok(dims)
}

fn scale(size: u32, minor: u32, major: u32) -> u32 {
    let ratio = f64::from(minor) / f64::from(major);
    (f64::from(size) * ratio) as u32
}
