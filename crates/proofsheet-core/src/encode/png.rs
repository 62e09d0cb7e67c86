//! PNG encoding for export.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};

use super::{EncodeError, OutputFormat};
use crate::decode::{ChannelLayout, Image};
use crate::metadata::{exif_payload, MetadataSet};

/// Encode an image to PNG bytes, preserving alpha.
///
/// Uses maximum compression with adaptive per-row filtering. The output size
/// depends only on the pixels, so the resolver relaxes resolution rather than
/// quality to meet a byte budget. Metadata goes into an `eXIf` chunk.
pub fn encode_png(image: &Image, metadata: &MetadataSet) -> Result<Vec<u8>, EncodeError> {
    let color_type = match image.layout() {
        ChannelLayout::Rgb => ExtendedColorType::Rgb8,
        ChannelLayout::Rgba => ExtendedColorType::Rgba8,
    };

    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive)
        .write_image(image.pixels(), image.width(), image.height(), color_type)
        .map_err(|e| EncodeError::codec(OutputFormat::Png, e))?;
    let encoded = buffer.into_inner();

    match exif_payload(metadata)? {
        Some(exif) => embed_exif_png(encoded, exif),
        None => Ok(encoded),
    }
}

fn embed_exif_png(png_data: Vec<u8>, exif: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    let mut png = Png::from_bytes(Bytes::from(png_data))
        .map_err(|e| EncodeError::Metadata(format!("failed to parse PNG for EXIF: {e}")))?;
    png.set_exif(Some(Bytes::from(exif)));

    let mut output = Vec::new();
    png.encoder()
        .write_to(&mut output)
        .map_err(|e| EncodeError::Metadata(format!("failed to write PNG with EXIF: {e}")))?;
    Ok(output)
}
