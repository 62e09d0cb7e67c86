//! Shared fixtures for the end-to-end render tests.
#![allow(dead_code)]

use proofsheet_core::decode::ChannelLayout;
use proofsheet_core::encode::encode;
use proofsheet_core::{Image, MetadataSet, MetadataTag, OutputFormat, TagValue};

/// Camera-style tags, including a GPS position.
pub fn camera_metadata() -> MetadataSet {
    let mut metadata = MetadataSet::new();
    metadata.insert(MetadataTag::MAKE, TagValue::ascii("Proofsheet Camera"));
    metadata.insert(MetadataTag::MODEL, TagValue::ascii("PS-1"));
    metadata.insert(MetadataTag::COPYRIGHT, TagValue::ascii("Jane Doe"));
    metadata.insert(MetadataTag::GPS_VERSION_ID, TagValue::Byte(vec![2, 3, 0, 0]));
    metadata.insert(MetadataTag::GPS_LATITUDE_REF, TagValue::ascii("N"));
    metadata.insert(
        MetadataTag::GPS_LATITUDE,
        TagValue::Rational(vec![(47, 1), (36, 1), (1234, 100)]),
    );
    metadata
}

/// A gradient with grain, so encoders see something like photographic detail.
pub fn textured(width: u32, height: u32, grain: u8) -> Image {
    let mut state = 0x9e37_79b9_u32;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = if grain == 0 { 0 } else { (state % u32::from(grain)) as u8 };

            let r = (x * 200 / width) as u8;
            let g = (y * 200 / height) as u8;
            let b = ((x + y) * 100 / (width + height)) as u8 + 60;
            pixels.extend([r.saturating_add(noise), g.saturating_add(noise), b.saturating_add(noise)]);
        }
    }
    Image::new(width, height, ChannelLayout::Rgb, pixels).expect("fixture dimensions are valid")
}

/// A JPEG source carrying [`camera_metadata`].
pub fn camera_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&textured(width, height, 24), &camera_metadata(), OutputFormat::Jpeg, 95)
        .expect("fixture encodes")
}
