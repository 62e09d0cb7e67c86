//! Source decoding for the export pipeline.
//!
//! This module provides functionality for:
//! - Decoding JPEG, PNG and TIFF sources into an upright [`Image`]
//! - Extracting the EXIF metadata that travels with the source
//! - Resampling helpers shared by later stages
//!
//! # Architecture
//!
//! Decoding is the first stage of every render. It is synchronous and
//! allocation-bound; nothing here touches the file system or network, the
//! caller hands in bytes fetched through an asset store.
//!
//! # Examples
//!
//! ```ignore
//! use proofsheet_core::decode::decode_source;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let source = decode_source(&bytes).unwrap();
//! println!("Decoded {}x{} with {} tags", source.image.width(), source.image.height(), source.metadata.len());
//! ```

mod resize;
mod source;
mod types;

pub use resize::{resize, scale_dimensions};
pub use source::{decode_source, DecodedSource};
pub use types::{ChannelLayout, DecodeError, FilterType, Image, Orientation};
