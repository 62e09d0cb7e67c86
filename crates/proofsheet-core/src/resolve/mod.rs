//! Constraint resolution: fitting an image to pixel and byte budgets.
//!
//! Resolution runs in two phases around the watermark and color stages:
//!
//! - **Phase A** ([`fit_pixel_budget`]) scales the edited image down once so
//!   that `width * height` fits `max_pixels`. Later stages never grow it.
//! - **Phase B** ([`fit_byte_budget`]) encodes the final image and searches
//!   for the highest JPEG quality, or the largest resolution for lossless
//!   formats, whose output fits `max_file_size_bytes`.
//!
//! Phase B is the only loop in the pipeline and is bounded: at most
//! `ceil(log2(quality))` extra encodes for the quality search plus
//! `max_shrink_rounds` for the resolution search.

mod budget;
mod pixels;

pub use budget::{fit_byte_budget, search_quality, QualitySearch, Resolved};
pub use pixels::{fit_pixel_budget, pixel_budget_dimensions};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::error::RenderError;

/// Errors raised while resolving constraints.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Resampling rejected the computed dimensions.
    #[error("Resize failed: {0}")]
    Resize(#[from] DecodeError),
}

/// Tuning knobs for the byte-budget search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Per-round linear scale applied when shrinking (0 < f < 1)
    pub shrink_factor: f64,
    /// Maximum number of shrink rounds
    pub max_shrink_rounds: u32,
    /// Let JPEG fall back to shrinking once quality 1 is still too large
    pub downscale_lossy: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            shrink_factor: 0.9,
            max_shrink_rounds: 10,
            downscale_lossy: true,
        }
    }
}

impl ResolverConfig {
    /// # Errors
    ///
    /// Returns `RenderError::InvalidParameter` if the shrink factor is not
    /// strictly between 0 and 1 or no shrink round is allowed.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(RenderError::invalid(
                "shrinkFactor",
                format!("{} is outside (0, 1)", self.shrink_factor),
            ));
        }
        if self.max_shrink_rounds == 0 {
            return Err(RenderError::invalid("maxShrinkRounds", "must be at least 1"));
        }
        Ok(())
    }
}

/// How the byte budget was handled for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum BudgetStatus {
    /// No byte budget was requested.
    Unconstrained,
    /// The output fits the budget.
    Met,
    /// Nothing tried fits; the smallest encoding is returned.
    Unattainable { budget: u64, achieved: u64 },
}

impl BudgetStatus {
    pub fn is_met(self) -> bool {
        !matches!(self, BudgetStatus::Unattainable { .. })
    }
}
