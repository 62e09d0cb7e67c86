//! Phase A: pixel-count budget.

use crate::decode::{resize, DecodeError, FilterType, Image};

/// Largest dimensions with the source aspect ratio whose area fits
/// `max_pixels`.
///
/// Each side is scaled by `sqrt(max_pixels / (width * height))` and rounded.
/// When rounding pushes the area over budget, the side that gained more from
/// rounding is floored to fit, then the other if still needed. Sides never
/// drop below 1 and never grow.
pub fn pixel_budget_dimensions(width: u32, height: u32, max_pixels: u64) -> (u32, u32) {
    let total = u64::from(width) * u64::from(height);
    if total <= max_pixels {
        return (width, height);
    }
    let max_pixels = max_pixels.max(1);

    let ratio = (max_pixels as f64 / total as f64).sqrt();
    let exact_w = f64::from(width) * ratio;
    let exact_h = f64::from(height) * ratio;
    let mut new_w = (exact_w.round() as u32).clamp(1, width);
    let mut new_h = (exact_h.round() as u32).clamp(1, height);

    let area = |w: u32, h: u32| u64::from(w) * u64::from(h);
    let fit = |other: u32| (max_pixels / u64::from(other)).clamp(1, u64::from(u32::MAX)) as u32;

    if area(new_w, new_h) > max_pixels {
        let gain_w = f64::from(new_w) - exact_w;
        let gain_h = f64::from(new_h) - exact_h;
        if gain_w >= gain_h {
            new_w = fit(new_h).min(new_w);
            if area(new_w, new_h) > max_pixels {
                new_h = fit(new_w).min(new_h);
            }
        } else {
            new_h = fit(new_w).min(new_h);
            if area(new_w, new_h) > max_pixels {
                new_w = fit(new_h).min(new_w);
            }
        }
    }

    (new_w, new_h)
}

/// Scale an image down so its pixel count fits `max_pixels`.
///
/// Images already within budget are returned unchanged. Downscaling uses
/// Lanczos3 so fine detail does not alias.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` only if the computed dimensions
/// are zero, which the clamping above rules out.
pub fn fit_pixel_budget(image: Image, max_pixels: u64) -> Result<Image, DecodeError> {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = pixel_budget_dimensions(width, height, max_pixels);
    if (new_w, new_h) == (width, height) {
        return Ok(image);
    }

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = new_w,
        to_height = new_h,
        max_pixels,
        "fitting pixel budget"
    );
    resize(&image, new_w, new_h, FilterType::Lanczos3)
}
