//! Output encoding for exports.
//!
//! This module provides functionality for:
//! - Encoding images to JPEG, PNG or TIFF
//! - Embedding the retained metadata in each container's native slot
//!
//! # Architecture
//!
//! Encoding is a pure function of `(image, metadata, format, quality)` and is
//! deterministic, which lets the constraint resolver call it repeatedly while
//! searching for a quality or resolution that fits a byte budget.
//!
//! # Examples
//!
//! ```ignore
//! use proofsheet_core::encode::{encode, OutputFormat};
//! use proofsheet_core::metadata::MetadataSet;
//!
//! let bytes = encode(&image, &MetadataSet::new(), OutputFormat::Jpeg, 90).unwrap();
//! println!("Encoded {} bytes", bytes.len());
//! ```

mod jpeg;
mod png;
mod tiff;

pub use self::jpeg::encode_jpeg;
pub use self::png::encode_png;
pub use self::tiff::encode_tiff;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::Image;
use crate::metadata::MetadataSet;

/// Errors that can occur while encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The codec rejected the pixel data or failed to write.
    #[error("{format} encoding failed: {reason}")]
    Codec { format: OutputFormat, reason: String },

    /// The metadata block could not be built or embedded.
    #[error("Metadata embedding failed: {0}")]
    Metadata(String),
}

impl EncodeError {
    pub(crate) fn codec(format: OutputFormat, err: impl fmt::Display) -> Self {
        EncodeError::Codec {
            format,
            reason: err.to_string(),
        }
    }
}

/// Container format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Tiff,
}

impl OutputFormat {
    /// MIME type of the encoded bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Tiff => "image/tiff",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Whether the format trades quality for size.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }

    /// The part of `metadata` this container can carry.
    ///
    /// JPEG and PNG embed a full EXIF block. TIFF writes only the descriptive
    /// ASCII tags of the primary directory.
    pub fn writable_metadata(self, metadata: &MetadataSet) -> MetadataSet {
        match self {
            OutputFormat::Jpeg | OutputFormat::Png => metadata.clone(),
            OutputFormat::Tiff => self::tiff::writable_tags(metadata),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

/// Parse failure for a format name; carries the rejected input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported output format: {0}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(OutputFormat::Jpeg),
            "PNG" => Ok(OutputFormat::Png),
            "TIFF" | "TIF" => Ok(OutputFormat::Tiff),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// Encode an image in `format`, embedding `metadata`.
///
/// # Arguments
///
/// * `image` - Pixels to encode; alpha is kept where the format allows it
/// * `metadata` - Tags to embed (filtered by [`OutputFormat::writable_metadata`])
/// * `format` - Output container
/// * `quality` - JPEG quality (clamped to 1-100); ignored by lossless formats
///
/// # Errors
///
/// Returns `EncodeError::Codec` if the codec fails and
/// `EncodeError::Metadata` if the metadata block cannot be embedded.
pub fn encode(
    image: &Image,
    metadata: &MetadataSet,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, metadata, quality),
        OutputFormat::Png => encode_png(image, metadata),
        OutputFormat::Tiff => encode_tiff(image, metadata),
    }
}
