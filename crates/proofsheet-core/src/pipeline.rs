//! Render orchestration
//!
//! Runs the fixed stage sequence for one export:
//!
//! 1. Validate edits and settings
//! 2. Decode the source (orientation applied, metadata extracted)
//! 3. Apply edits
//! 4. Resize to the pixel budget (phase A)
//! 5. Composite the watermark
//! 6. Convert to the target color space
//! 7. Filter metadata by policy
//! 8. Encode to the byte budget (phase B)
//!
//! Every failure aborts the render and is attributed to its [`Stage`].

use serde::{Deserialize, Serialize};

use crate::adjustments::apply_edits;
use crate::color::{self, ColorSpace};
use crate::decode::decode_source;
use crate::error::{ErrorKind, RenderError, Stage};
use crate::metadata::MetadataSet;
use crate::resolve::{fit_byte_budget, fit_pixel_budget, BudgetStatus, ResolveError};
use crate::watermark::composite;
use crate::{EditParameters, ExportSettings};

/// The encoded deliverable and what it ended up being.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Effective JPEG quality; `None` for lossless formats
    pub quality: Option<u8>,
    /// Color space of the encoded pixels
    pub color_space: ColorSpace,
    /// Tags actually written into the output
    pub metadata: MetadataSet,
    pub budget: BudgetStatus,
}

impl RenderResult {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn budget_met(&self) -> bool {
        self.budget.is_met()
    }

    /// Turn an unattainable byte budget into an error for callers that must
    /// not ship oversized output.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::BudgetUnattainable` when the budget was not met.
    pub fn require_budget(self) -> Result<Self, RenderError> {
        match self.budget {
            BudgetStatus::Unattainable { budget, achieved } => {
                Err(RenderError::BudgetUnattainable { budget, achieved })
            }
            _ => Ok(self),
        }
    }
}

/// Terminal state of a render.
#[derive(Debug)]
pub enum RenderOutcome {
    Succeeded(RenderResult),
    Failed(RenderError),
}

/// Serializable summary of a [`RenderOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "status", content = "kind")]
pub enum RenderStatus {
    Succeeded,
    Failed(ErrorKind),
}

impl RenderOutcome {
    pub fn status(&self) -> RenderStatus {
        match self {
            RenderOutcome::Succeeded(_) => RenderStatus::Succeeded,
            RenderOutcome::Failed(err) => RenderStatus::Failed(err.kind()),
        }
    }

    pub fn into_result(self) -> Result<RenderResult, RenderError> {
        self.into()
    }
}

impl From<Result<RenderResult, RenderError>> for RenderOutcome {
    fn from(result: Result<RenderResult, RenderError>) -> Self {
        match result {
            Ok(r) => RenderOutcome::Succeeded(r),
            Err(e) => RenderOutcome::Failed(e),
        }
    }
}

impl From<RenderOutcome> for Result<RenderResult, RenderError> {
    fn from(outcome: RenderOutcome) -> Self {
        match outcome {
            RenderOutcome::Succeeded(r) => Ok(r),
            RenderOutcome::Failed(e) => Err(e),
        }
    }
}

/// Render `source` into the deliverable described by `settings`.
///
/// Identical inputs produce identical bytes. An unattainable byte budget is
/// not an error here: the smallest encoding is returned and flagged in
/// [`RenderResult::budget`].
///
/// # Errors
///
/// Returns `RenderError` for invalid settings, undecodable sources,
/// unsupported color spaces and encoder failures.
pub fn render(
    source: &[u8],
    edits: &EditParameters,
    settings: &ExportSettings,
) -> Result<RenderResult, RenderError> {
    let span = tracing::debug_span!(
        "render",
        format = %settings.format,
        color_space = %settings.color_space,
        source_len = source.len()
    );
    let _enter = span.enter();

    edits.validate()?;
    settings.validate()?;

    let decoded = decode_source(source)?;
    let mut image = decoded.image;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        layout = ?image.layout(),
        source_space = %image.color_space(),
        tags = decoded.metadata.len(),
        "decoded source"
    );

    apply_edits(&mut image, edits);
    tracing::debug!(?edits, "applied edits");

    if let Some(max_pixels) = settings.max_pixels {
        image = fit_pixel_budget(image, max_pixels).map_err(|e| RenderError::Internal {
            stage: Stage::Resize,
            reason: e.to_string(),
        })?;
    }
    tracing::debug!(width = image.width(), height = image.height(), "resolved pixel budget");

    if let Some(watermark) = &settings.watermark {
        image = composite(image, watermark);
    }

    let source_space = image.color_space();
    image = color::convert(image, settings.color_space).map_err(|e| {
        RenderError::UnsupportedColorSpace {
            stage: Stage::ColorSpace,
            space: e.0.to_string(),
        }
    })?;
    tracing::debug!(color_space = %image.color_space(), "mapped color space");

    let mut source_metadata = decoded.metadata;
    color::drop_stale_tags(&mut source_metadata, source_space, image.color_space());
    let retained = settings.metadata_policy.apply(source_metadata);
    let metadata = settings.format.writable_metadata(&retained);
    tracing::debug!(
        policy = %settings.metadata_policy,
        retained = retained.len(),
        written = metadata.len(),
        "filtered metadata"
    );

    let resolved = fit_byte_budget(
        image,
        &metadata,
        settings.format,
        settings.quality,
        settings.max_file_size_bytes,
        &settings.resolver,
    )
    .map_err(|e| match e {
        ResolveError::Encode(source) => RenderError::Encode {
            stage: Stage::Encode,
            format: settings.format,
            source,
        },
        ResolveError::Resize(err) => RenderError::Internal {
            stage: Stage::Resize,
            reason: err.to_string(),
        },
    })?;

    if let BudgetStatus::Unattainable { budget, achieved } = resolved.status {
        tracing::warn!(budget, achieved, "byte budget unattainable; returning smallest encoding");
    }

    let (width, height) = resolved.image.dimensions();
    tracing::info!(
        width,
        height,
        bytes = resolved.bytes.len(),
        quality = ?resolved.quality,
        encodes = resolved.encodes,
        budget = ?resolved.status,
        "render complete"
    );

    Ok(RenderResult {
        bytes: resolved.bytes,
        content_type: settings.format.content_type(),
        width,
        height,
        quality: resolved.quality,
        color_space: resolved.image.color_space(),
        metadata,
        budget: resolved.status,
    })
}

/// [`render`], reported as a terminal state.
pub fn render_outcome(
    source: &[u8],
    edits: &EditParameters,
    settings: &ExportSettings,
) -> RenderOutcome {
    render(source, edits, settings).into()
}
