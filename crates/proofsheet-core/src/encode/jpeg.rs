//! JPEG encoding for export.
//!
//! This module provides JPEG encoding using the `image` crate's JPEG encoder.
//! Transparent pixels are composited over white, since JPEG has no alpha
//! channel. Metadata is written as an EXIF APP1 segment.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};

use super::{EncodeError, OutputFormat};
use crate::decode::Image;
use crate::metadata::{exif_payload, MetadataSet};

/// Encode an image to JPEG bytes.
///
/// # Arguments
///
/// * `image` - Pixels to encode; alpha is flattened over white
/// * `metadata` - Tags to embed as EXIF; an empty set writes no APP1 segment
/// * `quality` - JPEG quality (1-100, where 100 is highest quality)
///
/// # Quality Guidelines
///
/// * 90-100: High quality, suitable for archival or further editing
/// * 80-90: Good quality, recommended for most uses (default: 90)
/// * 60-80: Medium quality, acceptable for web/social media
/// * Below 60: Low quality, visible artifacts
pub fn encode_jpeg(
    image: &Image,
    metadata: &MetadataSet,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    // Clamp quality to valid range (1-100)
    let quality = quality.clamp(1, 100);

    let flattened;
    let pixels = if image.layout().has_alpha() {
        flattened = flatten_over_white(image.pixels());
        flattened.as_slice()
    } else {
        image.pixels()
    };

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(pixels, image.width(), image.height(), ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::codec(OutputFormat::Jpeg, e))?;
    let encoded = buffer.into_inner();

    match exif_payload(metadata)? {
        Some(exif) => embed_exif_jpeg(encoded, exif),
        None => Ok(encoded),
    }
}

/// Composite RGBA over an opaque white matte, producing RGB.
fn flatten_over_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let alpha = u32::from(px[3]);
        for &c in &px[..3] {
            let blended = (u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

/// Insert an EXIF APP1 segment into an encoded JPEG.
fn embed_exif_jpeg(jpeg_data: Vec<u8>, exif: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_data))
        .map_err(|e| EncodeError::Metadata(format!("failed to parse JPEG for EXIF: {e}")))?;
    jpeg.set_exif(Some(Bytes::from(exif)));

    let mut output = Vec::new();
    jpeg.encoder()
        .write_to(&mut output)
        .map_err(|e| EncodeError::Metadata(format!("failed to write JPEG with EXIF: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ChannelLayout;
    use crate::metadata::{MetadataTag, TagValue};

    fn gray(width: u32, height: u32) -> Image {
        let pixels = vec![128u8; (width * height * 3) as usize];
        Image::new(width, height, ChannelLayout::Rgb, pixels).unwrap()
    }

    fn gradient(width: u32, height: u32) -> Image {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(128);
            }
        }
        Image::new(width, height, ChannelLayout::Rgb, pixels).unwrap()
    }

    #[test]
    fn test_encode_jpeg_basic() {
        let jpeg_bytes = encode_jpeg(&gray(100, 100), &MetadataSet::new(), 90).unwrap();

        // Check JPEG magic bytes (SOI marker)
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);

        // Check JPEG ends with EOI marker
        let len = jpeg_bytes.len();
        assert_eq!(&jpeg_bytes[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_quality_affects_size() {
        let img = gradient(100, 100);

        let low_q = encode_jpeg(&img, &MetadataSet::new(), 20).unwrap();
        let high_q = encode_jpeg(&img, &MetadataSet::new(), 95).unwrap();

        assert!(high_q.len() > low_q.len());
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        let img = gray(10, 10);

        // Quality 0 should be clamped to 1
        assert!(encode_jpeg(&img, &MetadataSet::new(), 0).is_ok());

        // Quality 255 should be clamped to 100
        assert!(encode_jpeg(&img, &MetadataSet::new(), 255).is_ok());
    }

    #[test]
    fn test_encode_jpeg_small_image() {
        let img = Image::new(1, 1, ChannelLayout::Rgb, vec![255, 0, 0]).unwrap();
        let jpeg_bytes = encode_jpeg(&img, &MetadataSet::new(), 90).unwrap();
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_flatten_over_white() {
        let rgba = [0, 0, 0, 0, 0, 0, 0, 255, 100, 50, 200, 128];
        let rgb = flatten_over_white(&rgba);
        assert_eq!(&rgb[0..3], &[255, 255, 255]); // transparent -> white
        assert_eq!(&rgb[3..6], &[0, 0, 0]); // opaque black stays black
        assert_eq!(rgb[6], ((100 * 128 + 255 * 127 + 127) / 255) as u8);
    }

    #[test]
    fn test_encode_jpeg_with_alpha_source() {
        let img = Image::new(4, 4, ChannelLayout::Rgba, vec![0u8; 4 * 4 * 4]).unwrap();
        let bytes = encode_jpeg(&img, &MetadataSet::new(), 90).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().into_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c > 245)));
    }

    #[test]
    fn test_encode_jpeg_embeds_exif() {
        let mut metadata = MetadataSet::new();
        metadata.insert(MetadataTag::MAKE, TagValue::ascii("Hasselblad"));

        let plain = encode_jpeg(&gray(16, 16), &MetadataSet::new(), 90).unwrap();
        let tagged = encode_jpeg(&gray(16, 16), &metadata, 90).unwrap();
        assert!(tagged.len() > plain.len());

        let exif = crate::metadata::read_exif(&tagged).unwrap();
        let read = MetadataSet::from_exif(&exif);
        assert_eq!(read, metadata);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
