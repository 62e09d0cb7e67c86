//! Source asset decoding with EXIF orientation and metadata extraction.

use std::io::Cursor;

use exif::{Exif, In, Tag, Value};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, Image, Orientation};
use crate::color::ColorSpace;
use crate::metadata::{self, MetadataSet};

/// A decoded source: upright pixels plus the auxiliary tags that travel with them.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub image: Image,
    pub metadata: MetadataSet,
}

/// Decode JPEG, PNG or TIFF bytes into an upright [`Image`] and its metadata.
///
/// The container is sniffed from the bytes, not trusted from a file name.
/// EXIF orientation is baked into the pixels, so the orientation tag itself
/// is not carried forward. Images are tagged Adobe RGB when the EXIF
/// interoperability index says `R03`, sRGB otherwise.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for empty or unrecognized input and
/// `DecodeError::CorruptedFile` when the codec rejects the data.
pub fn decode_source(bytes: &[u8]) -> Result<DecodedSource, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::InvalidFormat);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let exif = metadata::read_exif(bytes);
    let orientation = exif.as_ref().map(extract_orientation).unwrap_or_default();
    let color_space = exif
        .as_ref()
        .map(extract_color_space)
        .unwrap_or(ColorSpace::Srgb);
    let metadata = exif
        .as_ref()
        .map(MetadataSet::from_exif)
        .unwrap_or_default();

    let image = Image::from_dynamic(apply_orientation(img, orientation))?
        .with_color_space(color_space);

    Ok(DecodedSource { image, metadata })
}

fn extract_orientation(exif: &Exif) -> Orientation {
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map(Orientation::from)
        .unwrap_or_default()
}

fn extract_color_space(exif: &Exif) -> ColorSpace {
    match exif.get_field(Tag::InteroperabilityIndex, In::PRIMARY) {
        Some(field) => match &field.value {
            Value::Ascii(strings) if strings.first().is_some_and(|s| s.as_slice() == b"R03") => {
                ColorSpace::AdobeRgb
            }
            _ => ColorSpace::Srgb,
        },
        None => ColorSpace::Srgb,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ChannelLayout;
    use crate::encode::{encode, OutputFormat};
    use crate::metadata::{MetadataTag, TagNamespace, TagValue};

    fn gradient(width: u32, height: u32, layout: ChannelLayout) -> Image {
        let channels = layout.channels();
        let mut pixels = Vec::with_capacity((width * height) as usize * channels);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(90);
                if channels == 4 {
                    pixels.push(200);
                }
            }
        }
        Image::new(width, height, layout, pixels).unwrap()
    }

    #[test]
    fn test_decode_png_roundtrip_is_lossless() {
        let img = gradient(32, 16, ChannelLayout::Rgb);
        let bytes = encode(&img, &MetadataSet::new(), OutputFormat::Png, 90).unwrap();

        let decoded = decode_source(&bytes).unwrap();
        assert_eq!(decoded.image, img);
        assert!(decoded.metadata.is_empty());
    }

    #[test]
    fn test_decode_png_keeps_alpha() {
        let img = gradient(8, 8, ChannelLayout::Rgba);
        let bytes = encode(&img, &MetadataSet::new(), OutputFormat::Png, 90).unwrap();

        let decoded = decode_source(&bytes).unwrap();
        assert_eq!(decoded.image.layout(), ChannelLayout::Rgba);
    }

    #[test]
    fn test_decode_jpeg_reads_metadata() {
        let mut metadata = MetadataSet::new();
        metadata.insert(MetadataTag::MAKE, TagValue::ascii("Fujifilm"));
        metadata.insert(MetadataTag::GPS_LATITUDE_REF, TagValue::ascii("N"));

        let img = gradient(24, 24, ChannelLayout::Rgb);
        let bytes = encode(&img, &metadata, OutputFormat::Jpeg, 90).unwrap();

        let decoded = decode_source(&bytes).unwrap();
        assert_eq!(decoded.image.dimensions(), (24, 24));
        assert_eq!(
            decoded.metadata.get(&MetadataTag::MAKE),
            Some(&TagValue::ascii("Fujifilm"))
        );
        assert_eq!(decoded.metadata.namespace(TagNamespace::Gps).count(), 1);
    }

    #[test]
    fn test_decode_applies_orientation() {
        let mut metadata = MetadataSet::new();
        metadata.insert(
            MetadataTag::new(TagNamespace::Tiff, 0x0112),
            TagValue::Short(vec![6]),
        );
        let img = gradient(40, 20, ChannelLayout::Rgb);
        let bytes = encode(&img, &metadata, OutputFormat::Jpeg, 90).unwrap();

        let decoded = decode_source(&bytes).unwrap();
        assert_eq!(decoded.image.dimensions(), (20, 40));
        assert!(decoded.metadata.is_empty(), "orientation is baked in, not carried");
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result = decode_source(&[0x00, 0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert!(matches!(decode_source(&[]), Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_truncated_jpeg() {
        let img = gradient(64, 64, ChannelLayout::Rgb);
        let bytes = encode(&img, &MetadataSet::new(), OutputFormat::Jpeg, 90).unwrap();

        let result = decode_source(&bytes[..20]);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }
}
