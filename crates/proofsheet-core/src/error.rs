//! Render errors and the pipeline stages they are attributed to.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::{EncodeError, OutputFormat};

/// A step of the render pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Validate,
    Decode,
    Edit,
    Resize,
    Watermark,
    ColorSpace,
    Metadata,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Decode => "decode",
            Stage::Edit => "edit",
            Stage::Resize => "resize",
            Stage::Watermark => "watermark",
            Stage::ColorSpace => "color space",
            Stage::Metadata => "metadata",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`RenderError`], suitable for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Decode,
    UnsupportedColorSpace,
    UnsupportedFormat,
    InvalidParameter,
    BudgetUnattainable,
    Encode,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Decode => "DECODE",
            ErrorKind::UnsupportedColorSpace => "UNSUPPORTED_COLOR_SPACE",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::BudgetUnattainable => "BUDGET_UNATTAINABLE",
            ErrorKind::Encode => "ENCODE",
            ErrorKind::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Errors produced by [`crate::render`] and the settings parsers.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The source bytes could not be decoded.
    #[error("Failed to decode source: {0}")]
    Decode(#[from] DecodeError),

    /// A color space was named that the mapper cannot produce or consume.
    #[error("Unsupported color space '{space}' at {stage} stage")]
    UnsupportedColorSpace { stage: Stage, space: String },

    /// An output format was named that the encoder does not know.
    #[error("Unsupported output format '{0}'")]
    UnsupportedFormat(String),

    /// A setting or edit value is out of range.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    /// The byte budget could not be met at any quality or resolution tried.
    #[error("Byte budget of {budget} bytes unattainable; smallest encoding was {achieved} bytes")]
    BudgetUnattainable { budget: u64, achieved: u64 },

    /// The encoder failed.
    #[error("Failed to encode {format} at {stage} stage: {source}")]
    Encode {
        stage: Stage,
        format: OutputFormat,
        #[source]
        source: EncodeError,
    },

    /// An internal invariant did not hold.
    #[error("Internal error at {stage} stage: {reason}")]
    Internal { stage: Stage, reason: String },
}

impl RenderError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        RenderError::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Decode(_) => ErrorKind::Decode,
            RenderError::UnsupportedColorSpace { .. } => ErrorKind::UnsupportedColorSpace,
            RenderError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RenderError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            RenderError::BudgetUnattainable { .. } => ErrorKind::BudgetUnattainable,
            RenderError::Encode { .. } => ErrorKind::Encode,
            RenderError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// The pipeline stage the error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            RenderError::Decode(_) => Stage::Decode,
            RenderError::UnsupportedColorSpace { stage, .. } => *stage,
            RenderError::UnsupportedFormat(_) | RenderError::InvalidParameter { .. } => {
                Stage::Validate
            }
            RenderError::BudgetUnattainable { .. } => Stage::Encode,
            RenderError::Encode { stage, .. } => *stage,
            RenderError::Internal { stage, .. } => *stage,
        }
    }
}

impl From<crate::encode::UnsupportedFormat> for RenderError {
    fn from(err: crate::encode::UnsupportedFormat) -> Self {
        RenderError::UnsupportedFormat(err.0)
    }
}

impl From<crate::color::UnknownColorSpace> for RenderError {
    fn from(err: crate::color::UnknownColorSpace) -> Self {
        RenderError::UnsupportedColorSpace {
            stage: Stage::Validate,
            space: err.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpace;

    #[test]
    fn test_kind_and_stage() {
        let err = RenderError::from(DecodeError::InvalidFormat);
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.stage(), Stage::Decode);

        let err = RenderError::invalid("quality", "must be between 1 and 100");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.stage(), Stage::Validate);

        let err = RenderError::Encode {
            stage: Stage::Encode,
            format: OutputFormat::Png,
            source: EncodeError::Metadata("bad".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_parse_errors_convert() {
        let err: RenderError = "GIF".parse::<OutputFormat>().unwrap_err().into();
        assert!(matches!(err, RenderError::UnsupportedFormat(ref name) if name == "GIF"));

        let err: RenderError = "CMYK".parse::<ColorSpace>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedColorSpace);
        assert_eq!(err.stage(), Stage::Validate);
    }

    #[test]
    fn test_display() {
        let err = RenderError::BudgetUnattainable {
            budget: 1000,
            achieved: 1500,
        };
        assert_eq!(
            err.to_string(),
            "Byte budget of 1000 bytes unattainable; smallest encoding was 1500 bytes"
        );
        assert_eq!(Stage::ColorSpace.to_string(), "color space");
        assert_eq!(ErrorKind::InvalidParameter.to_string(), "INVALID_PARAMETER");
    }
}
