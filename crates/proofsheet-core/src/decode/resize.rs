//! Resampling helpers shared by the constraint resolver and the watermark
//! compositor.
//!
//! All functions return new `Image` instances without modifying the input.

use super::{DecodeError, FilterType, Image};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if either target dimension is zero.
pub fn resize(
    image: &Image,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Image, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    Ok(image.resampled(width, height, filter))
}

/// Scale both dimensions by `factor`, rounding to the nearest integer and
/// never returning a zero-sized edge.
pub fn scale_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |edge: u32| ((edge as f64 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}
