//! Output color space mapping.
//!
//! Converting between RGB spaces is a three step operation per pixel:
//! decode the source transfer curve to linear light, apply a single 3x3
//! matrix (source RGB -> XYZ -> target RGB), then encode with the target
//! transfer curve. Both curves are tabulated once per conversion.

mod gamut;
mod transfer;

pub use gamut::{Chromaticity, Matrix3, Primaries};
pub use transfer::{DecodeLut, EncodeLut, TransferFunction};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::Image;
use crate::metadata::{MetadataSet, MetadataTag};

/// Tags that name the space the pixels are encoded in.
pub const COLOR_TAGS: [MetadataTag; 2] = [MetadataTag::COLOR_SPACE, MetadataTag::INTEROP_INDEX];

/// RGB spaces an export can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "SRGB")]
    Srgb,
    #[serde(rename = "DISPLAY_P3")]
    DisplayP3,
    #[serde(rename = "ADOBE_RGB")]
    AdobeRgb,
    #[serde(rename = "REC2020")]
    Rec2020,
    #[serde(rename = "PROPHOTO_RGB")]
    ProPhotoRgb,
}

impl ColorSpace {
    pub fn primaries(self) -> Primaries {
        match self {
            ColorSpace::Srgb => gamut::SRGB_PRIMARIES,
            ColorSpace::DisplayP3 => gamut::DISPLAY_P3_PRIMARIES,
            ColorSpace::AdobeRgb => gamut::ADOBE_RGB_PRIMARIES,
            ColorSpace::Rec2020 => gamut::REC2020_PRIMARIES,
            ColorSpace::ProPhotoRgb => gamut::PROPHOTO_PRIMARIES,
        }
    }

    pub fn transfer(self) -> TransferFunction {
        match self {
            ColorSpace::Srgb | ColorSpace::DisplayP3 => TransferFunction::Srgb,
            ColorSpace::AdobeRgb => TransferFunction::Gamma(transfer::ADOBE_RGB_GAMMA),
            ColorSpace::Rec2020 => TransferFunction::Rec2020,
            ColorSpace::ProPhotoRgb => TransferFunction::Gamma(transfer::PROPHOTO_GAMMA),
        }
    }

    /// Whether pixels can be converted into or out of this space.
    ///
    /// ProPhoto RGB is referenced to D50 and would need chromatic adaptation,
    /// which the mapper does not implement.
    pub fn is_convertible(self) -> bool {
        !matches!(self, ColorSpace::ProPhotoRgb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorSpace::Srgb => "SRGB",
            ColorSpace::DisplayP3 => "DISPLAY_P3",
            ColorSpace::AdobeRgb => "ADOBE_RGB",
            ColorSpace::Rec2020 => "REC2020",
            ColorSpace::ProPhotoRgb => "PROPHOTO_RGB",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse failure for a color space name; carries the rejected input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown color space: {0}")]
pub struct UnknownColorSpace(pub String);

impl FromStr for ColorSpace {
    type Err = UnknownColorSpace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "SRGB" => Ok(ColorSpace::Srgb),
            "DISPLAY_P3" | "P3" => Ok(ColorSpace::DisplayP3),
            "ADOBE_RGB" | "ADOBERGB" => Ok(ColorSpace::AdobeRgb),
            "REC2020" | "REC_2020" | "BT2020" => Ok(ColorSpace::Rec2020),
            "PROPHOTO_RGB" | "PROPHOTO" => Ok(ColorSpace::ProPhotoRgb),
            _ => Err(UnknownColorSpace(s.to_string())),
        }
    }
}

/// A conversion touched a space the mapper cannot handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unsupported color space: {0}")]
pub struct UnsupportedColorSpace(pub ColorSpace);

/// Convert an image into `target`, keeping dimensions, layout and alpha.
///
/// An image already tagged `target` is returned untouched.
///
/// # Errors
///
/// Returns `UnsupportedColorSpace` if either the image's space or the target
/// is not convertible.
pub fn convert(mut image: Image, target: ColorSpace) -> Result<Image, UnsupportedColorSpace> {
    let source = image.color_space();
    if source == target {
        return Ok(image);
    }
    let matrix = conversion_matrix(source, target)?;

    let decode = DecodeLut::new(source.transfer());
    let encode = EncodeLut::new(target.transfer());
    let m = matrix.0.map(|row| row.map(|v| v as f32));

    let channels = image.layout().channels();
    for px in image.pixels_mut().chunks_exact_mut(channels) {
        let r = decode.lookup(px[0]);
        let g = decode.lookup(px[1]);
        let b = decode.lookup(px[2]);

        px[0] = encode.lookup(m[0][0] * r + m[0][1] * g + m[0][2] * b);
        px[1] = encode.lookup(m[1][0] * r + m[1][1] * g + m[1][2] * b);
        px[2] = encode.lookup(m[2][0] * r + m[2][1] * g + m[2][2] * b);
    }

    image.set_color_space(target);
    Ok(image)
}

/// Remove [`COLOR_TAGS`] when pixels were converted from `source` to
/// `target`, since they would still describe `source`.
pub fn drop_stale_tags(metadata: &mut MetadataSet, source: ColorSpace, target: ColorSpace) {
    if source != target {
        metadata.retain(|tag| !COLOR_TAGS.contains(tag));
    }
}

/// Linear `source` RGB -> linear `target` RGB.
fn conversion_matrix(source: ColorSpace, target: ColorSpace) -> Result<Matrix3, UnsupportedColorSpace> {
    for space in [source, target] {
        if !space.is_convertible() {
            return Err(UnsupportedColorSpace(space));
        }
    }

    let to_xyz = source
        .primaries()
        .rgb_to_xyz()
        .ok_or(UnsupportedColorSpace(source))?;
    let from_xyz = target
        .primaries()
        .rgb_to_xyz()
        .and_then(|m| m.inverse())
        .ok_or(UnsupportedColorSpace(target))?;

    Ok(from_xyz.multiply(&to_xyz))
}
