//! TIFF encoding for export.
//!
//! Pixels are written LZW-compressed through the `tiff` crate directly, which
//! gives access to the image directory. Descriptive ASCII tags are written
//! there; EXIF and GPS sub-directories are not.

use std::io::Cursor;

use ::tiff::encoder::compression::Lzw;
use ::tiff::encoder::{colortype, TiffEncoder};
use ::tiff::tags::Tag;

use super::{EncodeError, OutputFormat};
use crate::decode::{ChannelLayout, Image};
use crate::metadata::{MetadataSet, MetadataTag, TagValue};

/// Primary-directory tags a TIFF export carries.
const DESCRIPTIVE_TAGS: [MetadataTag; 8] = [
    MetadataTag::IMAGE_DESCRIPTION,
    MetadataTag::MAKE,
    MetadataTag::MODEL,
    MetadataTag::SOFTWARE,
    MetadataTag::DATE_TIME,
    MetadataTag::ARTIST,
    MetadataTag::HOST_COMPUTER,
    MetadataTag::COPYRIGHT,
];

/// The ASCII descriptive tags of `metadata`, in source order.
///
/// Only single-string values of 7-bit text without NUL survive, as the TIFF
/// writer rejects anything else.
pub(super) fn writable_tags(metadata: &MetadataSet) -> MetadataSet {
    metadata
        .iter()
        .filter(|(tag, value)| {
            if !DESCRIPTIVE_TAGS.contains(tag) {
                return false;
            }
            let writable = is_plain_ascii(value);
            if !writable {
                tracing::debug!(tag = tag.id, "skipping TIFF tag that is not plain ASCII");
            }
            writable
        })
        .map(|(tag, value)| (*tag, value.clone()))
        .collect()
}

fn is_plain_ascii(value: &TagValue) -> bool {
    match value {
        TagValue::Ascii(strings) => match strings.as_slice() {
            [text] => text.iter().all(|&b| b.is_ascii() && b != 0),
            _ => false,
        },
        _ => false,
    }
}

/// Encode an image to LZW-compressed TIFF bytes, preserving alpha.
pub fn encode_tiff(image: &Image, metadata: &MetadataSet) -> Result<Vec<u8>, EncodeError> {
    let err = |e: ::tiff::TiffError| EncodeError::codec(OutputFormat::Tiff, e);
    let tags: Vec<(u16, String)> = writable_tags(metadata)
        .iter()
        .filter_map(|(tag, value)| Some((tag.id, value.as_text()?)))
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).map_err(err)?;
        let (width, height) = image.dimensions();

        match image.layout() {
            ChannelLayout::Rgb => {
                let mut tiff = encoder
                    .new_image_with_compression::<colortype::RGB8, _>(width, height, Lzw::default())
                    .map_err(err)?;
                for (id, text) in &tags {
                    tiff.encoder()
                        .write_tag(Tag::Unknown(*id), text.as_str())
                        .map_err(err)?;
                }
                tiff.write_data(image.pixels()).map_err(err)?;
            }
            ChannelLayout::Rgba => {
                let mut tiff = encoder
                    .new_image_with_compression::<colortype::RGBA8, _>(width, height, Lzw::default())
                    .map_err(err)?;
                for (id, text) in &tags {
                    tiff.encoder()
                        .write_tag(Tag::Unknown(*id), text.as_str())
                        .map_err(err)?;
                }
                tiff.write_data(image.pixels()).map_err(err)?;
            }
        }
    }

    Ok(buffer.into_inner())
}
