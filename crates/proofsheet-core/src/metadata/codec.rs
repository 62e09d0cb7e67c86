//! Conversion between [`MetadataSet`] and EXIF (TIFF-structured) payloads.

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Exif, Field, In, Rational, Reader, SRational, Tag, Value};

use super::{MetadataSet, MetadataTag, TagNamespace, TagValue};
use crate::encode::EncodeError;

/// Tags that describe the container rather than the picture. They are
/// regenerated by the encoder (or baked into the pixels, in the case of
/// orientation) and never travel with the metadata set.
const STRUCTURAL_TIFF_TAGS: &[u16] = &[
    0x0100, // ImageWidth
    0x0101, // ImageLength
    0x0102, // BitsPerSample
    0x0103, // Compression
    0x0106, // PhotometricInterpretation
    0x0111, // StripOffsets
    0x0112, // Orientation
    0x0115, // SamplesPerPixel
    0x0116, // RowsPerStrip
    0x0117, // StripByteCounts
    0x011C, // PlanarConfiguration
    0x0144, // TileOffsets
    0x0145, // TileByteCounts
    0x014A, // SubIFDs
    0x0201, // JPEGInterchangeFormat
    0x0202, // JPEGInterchangeFormatLength
    0x8769, // ExifIFDPointer
    0x8825, // GPSInfoIFDPointer
];

const STRUCTURAL_EXIF_TAGS: &[u16] = &[
    0xA002, // PixelXDimension
    0xA003, // PixelYDimension
    0xA005, // InteropIFDPointer
];

/// Parse the EXIF block of a JPEG, PNG or TIFF container, if it has one.
pub(crate) fn read_exif(bytes: &[u8]) -> Option<Exif> {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::trace!(error = %e, "no readable EXIF block in source");
            None
        }
    }
}

impl MetadataSet {
    /// Collect the descriptive tags of the primary image.
    ///
    /// Thumbnail directories, structural tags and values the EXIF reader
    /// could not type are skipped.
    pub fn from_exif(exif: &Exif) -> Self {
        exif.fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .filter_map(|field| {
                let tag = tag_from_exif(field.tag)?;
                if is_structural(&tag) {
                    return None;
                }
                Some((tag, value_from_exif(&field.value)?))
            })
            .collect()
    }
}

/// Serialize a metadata set as a little-endian TIFF structure suitable for
/// a JPEG APP1 segment or a PNG `eXIf` chunk.
///
/// Returns `Ok(None)` for an empty set so callers write no block at all.
///
/// # Errors
///
/// Returns `EncodeError::Metadata` if the EXIF writer rejects a field.
pub fn exif_payload(metadata: &MetadataSet) -> Result<Option<Vec<u8>>, EncodeError> {
    if metadata.is_empty() {
        return Ok(None);
    }

    let fields: Vec<Field> = metadata
        .iter()
        .map(|(tag, value)| Field {
            tag: tag_to_exif(tag),
            ifd_num: In::PRIMARY,
            value: value_to_exif(value),
        })
        .collect();

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }

    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, false)
        .map_err(|e| EncodeError::Metadata(e.to_string()))?;
    Ok(Some(buf.into_inner()))
}

fn is_structural(tag: &MetadataTag) -> bool {
    match tag.namespace {
        TagNamespace::Tiff => STRUCTURAL_TIFF_TAGS.contains(&tag.id),
        TagNamespace::Exif => STRUCTURAL_EXIF_TAGS.contains(&tag.id),
        TagNamespace::Gps | TagNamespace::Interop => false,
    }
}

fn tag_from_exif(tag: Tag) -> Option<MetadataTag> {
    #[allow(unreachable_patterns)]
    let namespace = match tag.context() {
        Context::Tiff => TagNamespace::Tiff,
        Context::Exif => TagNamespace::Exif,
        Context::Gps => TagNamespace::Gps,
        Context::Interop => TagNamespace::Interop,
        _ => return None,
    };
    Some(MetadataTag::new(namespace, tag.number()))
}

fn tag_to_exif(tag: &MetadataTag) -> Tag {
    let context = match tag.namespace {
        TagNamespace::Tiff => Context::Tiff,
        TagNamespace::Exif => Context::Exif,
        TagNamespace::Gps => Context::Gps,
        TagNamespace::Interop => Context::Interop,
    };
    Tag(context, tag.id)
}

fn value_from_exif(value: &Value) -> Option<TagValue> {
    #[allow(unreachable_patterns)]
    let converted = match value {
        Value::Byte(v) => TagValue::Byte(v.clone()),
        Value::Ascii(v) => TagValue::Ascii(v.clone()),
        Value::Short(v) => TagValue::Short(v.clone()),
        Value::Long(v) => TagValue::Long(v.clone()),
        Value::Rational(v) => TagValue::Rational(v.iter().map(|r| (r.num, r.denom)).collect()),
        Value::SByte(v) => TagValue::SByte(v.clone()),
        Value::Undefined(v, _) => TagValue::Undefined(v.clone()),
        Value::SShort(v) => TagValue::SShort(v.clone()),
        Value::SLong(v) => TagValue::SLong(v.clone()),
        Value::SRational(v) => {
            TagValue::SRational(v.iter().map(|r| (r.num, r.denom)).collect())
        }
        Value::Float(v) => TagValue::Float(v.clone()),
        Value::Double(v) => TagValue::Double(v.clone()),
        Value::Unknown(..) => return None,
        _ => return None,
    };
    Some(converted)
}

fn value_to_exif(value: &TagValue) -> Value {
    match value {
        TagValue::Byte(v) => Value::Byte(v.clone()),
        TagValue::Ascii(v) => Value::Ascii(v.clone()),
        TagValue::Short(v) => Value::Short(v.clone()),
        TagValue::Long(v) => Value::Long(v.clone()),
        TagValue::Rational(v) => Value::Rational(
            v.iter()
                .map(|&(num, denom)| Rational { num, denom })
                .collect(),
        ),
        TagValue::SByte(v) => Value::SByte(v.clone()),
        TagValue::Undefined(v) => Value::Undefined(v.clone(), 0),
        TagValue::SShort(v) => Value::SShort(v.clone()),
        TagValue::SLong(v) => Value::SLong(v.clone()),
        TagValue::SRational(v) => Value::SRational(
            v.iter()
                .map(|&(num, denom)| SRational { num, denom })
                .collect(),
        ),
        TagValue::Float(v) => Value::Float(v.clone()),
        TagValue::Double(v) => Value::Double(v.clone()),
    }
}
