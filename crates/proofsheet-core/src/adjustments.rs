//! Tonal edit algorithms
//!
//! Applies exposure, contrast and saturation to decoded pixels.
//!
//! ## Adjustment Order
//! 1. Exposure
//! 2. Contrast
//! 3. Saturation
//!
//! Each adjustment clamps to `[0, 1]` before the next one runs, so a channel
//! pushed past white by exposure is treated as white by contrast. Alpha is
//! never touched.

use crate::decode::Image;
use crate::EditParameters;

/// ITU-R BT.709 coefficient for red channel in luminance calculation.
pub const LUMINANCE_R: f32 = 0.2126;

/// ITU-R BT.709 coefficient for green channel in luminance calculation.
pub const LUMINANCE_G: f32 = 0.7152;

/// ITU-R BT.709 coefficient for blue channel in luminance calculation.
pub const LUMINANCE_B: f32 = 0.0722;

/// Mid-gray pivot for contrast, in encoded values.
const CONTRAST_MIDPOINT: f32 = 0.5;

/// Apply all requested edits to an image in place.
///
/// # Arguments
/// * `image` - Decoded image; RGB or RGBA
/// * `edits` - The adjustment values to apply
///
/// # Example
/// ```ignore
/// use proofsheet_core::{EditParameters, adjustments::apply_edits};
///
/// let mut edits = EditParameters::default();
/// edits.exposure = Some(100.0); // doubles every channel
///
/// apply_edits(&mut image, &edits);
/// ```
pub fn apply_edits(image: &mut Image, edits: &EditParameters) {
    // Early exit if no adjustments
    if edits.is_empty() {
        return;
    }

    let channels = image.layout().channels();
    for chunk in image.pixels_mut().chunks_exact_mut(channels) {
        let mut r = chunk[0] as f32 / 255.0;
        let mut g = chunk[1] as f32 / 255.0;
        let mut b = chunk[2] as f32 / 255.0;

        if let Some(exposure) = edits.exposure {
            (r, g, b) = clamp_rgb(apply_exposure(r, g, b, exposure));
        }
        if let Some(contrast) = edits.contrast {
            (r, g, b) = clamp_rgb(apply_contrast(r, g, b, contrast));
        }
        if let Some(saturation) = edits.saturation {
            (r, g, b) = clamp_rgb(apply_saturation(r, g, b, saturation));
        }

        chunk[0] = to_u8(r);
        chunk[1] = to_u8(g);
        chunk[2] = to_u8(b);
    }
}

/// Calculate luminance from normalized RGB values (0.0 to 1.0).
#[inline]
pub fn calculate_luminance(r: f32, g: f32, b: f32) -> f32 {
    LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b
}

/// Apply exposure adjustment.
///
/// Formula: `output = input * (1 + exposure/100)`
#[inline]
fn apply_exposure(r: f32, g: f32, b: f32, exposure: f32) -> (f32, f32, f32) {
    let multiplier = 1.0 + exposure / 100.0;
    (r * multiplier, g * multiplier, b * multiplier)
}

/// Apply contrast adjustment.
///
/// Formula: `output = (input - 0.5) * (1 + contrast/100) + 0.5`
#[inline]
fn apply_contrast(r: f32, g: f32, b: f32, contrast: f32) -> (f32, f32, f32) {
    let factor = 1.0 + (contrast / 100.0);
    (
        (r - CONTRAST_MIDPOINT) * factor + CONTRAST_MIDPOINT,
        (g - CONTRAST_MIDPOINT) * factor + CONTRAST_MIDPOINT,
        (b - CONTRAST_MIDPOINT) * factor + CONTRAST_MIDPOINT,
    )
}

/// Apply saturation adjustment.
///
/// Scales each channel's distance from the pixel's luminance; -100 gives
/// grayscale.
#[inline]
fn apply_saturation(r: f32, g: f32, b: f32, saturation: f32) -> (f32, f32, f32) {
    let factor = 1.0 + (saturation / 100.0);
    let gray = calculate_luminance(r, g, b);
    (
        gray + (r - gray) * factor,
        gray + (g - gray) * factor,
        gray + (b - gray) * factor,
    )
}

#[inline]
fn clamp_rgb((r, g, b): (f32, f32, f32)) -> (f32, f32, f32) {
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::decode::ChannelLayout;
    use proptest::prelude::*;

    fn value() -> impl Strategy<Value = Option<f32>> {
        prop_oneof![Just(None), (-100.0f32..=200.0).prop_map(Some)]
    }

    proptest! {
        /// Property: Alpha channel never changes, whatever the edits.
        #[test]
        fn prop_alpha_preserved(
            pixels in prop::collection::vec(any::<u8>(), 4 * 16),
            exposure in value(),
            contrast in value(),
            saturation in value(),
        ) {
            let mut img = Image::new(4, 4, ChannelLayout::Rgba, pixels.clone()).unwrap();
            apply_edits(&mut img, &EditParameters { exposure, contrast, saturation });

            for (before, after) in pixels.chunks_exact(4).zip(img.pixels().chunks_exact(4)) {
                prop_assert_eq!(before[3], after[3]);
            }
        }

        /// Property: Gray pixels stay gray under saturation changes.
        #[test]
        fn prop_saturation_keeps_gray(level in any::<u8>(), saturation in -100.0f32..=200.0) {
            let mut img = Image::new(1, 1, ChannelLayout::Rgb, vec![level; 3]).unwrap();
            apply_edits(&mut img, &EditParameters { saturation: Some(saturation), ..Default::default() });

            let p = img.pixels();
            prop_assert!(p[0] == p[1] && p[1] == p[2]);
        }
    }
}
