//! Proofsheet Core - export rendering library
//!
//! This crate renders a final deliverable image from a source asset: it
//! decodes the source, applies edits, fits the result to pixel and byte
//! budgets, composites a watermark, maps the color space, filters metadata
//! and encodes. Identical inputs always produce identical bytes.
//!
//! The [`job`] module wraps [`render`] with the collaborator traits an export
//! worker needs (asset storage and completion notification).

pub mod adjustments;
pub mod color;
pub mod decode;
pub mod encode;
pub mod error;
pub mod job;
pub mod metadata;
pub mod pipeline;
pub mod resolve;
pub mod watermark;

pub use color::ColorSpace;
pub use decode::{DecodeError, Image};
pub use encode::{EncodeError, OutputFormat};
pub use error::{ErrorKind, RenderError, Stage};
pub use metadata::{MetadataPolicy, MetadataSet, MetadataTag, TagNamespace, TagValue};
pub use pipeline::{render, render_outcome, RenderOutcome, RenderResult, RenderStatus};
pub use resolve::{BudgetStatus, ResolverConfig};
pub use watermark::{Anchor, WatermarkAsset, WatermarkSpec};

/// JPEG quality used when a request does not name one.
pub const DEFAULT_QUALITY: u8 = 90;

/// Tonal edits applied before any resizing.
///
/// Values are signed percentage offsets. `None` skips the adjustment
/// entirely; `Some(0.0)` runs it as an explicit no-op value.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditParameters {
    /// Brightness gain (-100 to +100): multiplies channels by `1 + v/100`
    pub exposure: Option<f32>,
    /// Contrast (-100 to +100) around mid-gray
    pub contrast: Option<f32>,
    /// Saturation (-100 to +100); -100 yields grayscale
    pub saturation: Option<f32>,
}

impl EditParameters {
    /// Check if no adjustment is requested
    pub fn is_empty(&self) -> bool {
        self.exposure.is_none() && self.contrast.is_none() && self.saturation.is_none()
    }

    /// # Errors
    ///
    /// Returns `RenderError::InvalidParameter` for a non-finite value or one
    /// below -100.
    pub fn validate(&self) -> Result<(), RenderError> {
        for (name, value) in [
            ("exposure", self.exposure),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ] {
            match value {
                Some(v) if !v.is_finite() => {
                    return Err(RenderError::invalid(name, "must be a finite number"));
                }
                Some(v) if v < -100.0 => {
                    return Err(RenderError::invalid(name, format!("{v} is below -100")));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Everything that shapes the deliverable apart from the edits.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Upper bound on `width * height`
    pub max_pixels: Option<u64>,
    /// Upper bound on the encoded byte length
    pub max_file_size_bytes: Option<u64>,
    /// Starting JPEG quality (1-100); ignored by lossless formats
    pub quality: u8,
    pub format: OutputFormat,
    /// Target color space of the output pixels
    pub color_space: ColorSpace,
    pub metadata_policy: MetadataPolicy,
    pub watermark: Option<WatermarkSpec>,
    pub resolver: ResolverConfig,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_pixels: None,
            max_file_size_bytes: None,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::default(),
            color_space: ColorSpace::default(),
            metadata_policy: MetadataPolicy::default(),
            watermark: None,
            resolver: ResolverConfig::default(),
        }
    }
}

impl ExportSettings {
    /// Check every setting before any pixel work starts.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidParameter` for out-of-range values and
    /// `RenderError::UnsupportedColorSpace` for a target the mapper cannot
    /// produce.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(1..=100).contains(&self.quality) {
            return Err(RenderError::invalid(
                "quality",
                format!("{} is outside 1..=100", self.quality),
            ));
        }
        if self.max_pixels == Some(0) {
            return Err(RenderError::invalid("maxPixels", "must be positive"));
        }
        if self.max_file_size_bytes == Some(0) {
            return Err(RenderError::invalid("maxFileSizeBytes", "must be positive"));
        }
        if !self.color_space.is_convertible() {
            return Err(RenderError::UnsupportedColorSpace {
                stage: Stage::Validate,
                space: self.color_space.to_string(),
            });
        }
        if let Some(watermark) = &self.watermark {
            watermark.validate()?;
        }
        self.resolver.validate()
    }
}
