//! Auxiliary metadata carried from source to export.
//!
//! A [`MetadataSet`] is an ordered mapping from namespaced tag identifiers to
//! values. Namespaces follow the EXIF directory a tag lives in, which is what
//! lets policies drop a whole family (GPS) without knowing individual tags.
//!
//! The set is read from the source container once, filtered by a
//! [`MetadataPolicy`], and written back by the format encoder. No stage in
//! between adds tags.

mod codec;
mod policy;

pub use codec::exif_payload;
pub(crate) use codec::read_exif;
pub use policy::MetadataPolicy;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The EXIF directory a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagNamespace {
    /// Baseline TIFF tags of the primary image directory (make, model, ...).
    Tiff,
    /// The EXIF sub-directory (exposure, timestamps, lens, ...).
    Exif,
    /// The GPS sub-directory.
    Gps,
    /// The interoperability sub-directory.
    Interop,
}

impl fmt::Display for TagNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagNamespace::Tiff => "tiff",
            TagNamespace::Exif => "exif",
            TagNamespace::Gps => "gps",
            TagNamespace::Interop => "interop",
        };
        f.write_str(name)
    }
}

/// Namespaced tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetadataTag {
    pub namespace: TagNamespace,
    pub id: u16,
}

impl MetadataTag {
    pub const IMAGE_DESCRIPTION: Self = Self::new(TagNamespace::Tiff, 0x010E);
    pub const MAKE: Self = Self::new(TagNamespace::Tiff, 0x010F);
    pub const MODEL: Self = Self::new(TagNamespace::Tiff, 0x0110);
    pub const SOFTWARE: Self = Self::new(TagNamespace::Tiff, 0x0131);
    pub const DATE_TIME: Self = Self::new(TagNamespace::Tiff, 0x0132);
    pub const ARTIST: Self = Self::new(TagNamespace::Tiff, 0x013B);
    pub const HOST_COMPUTER: Self = Self::new(TagNamespace::Tiff, 0x013C);
    pub const COPYRIGHT: Self = Self::new(TagNamespace::Tiff, 0x8298);
    pub const DATE_TIME_ORIGINAL: Self = Self::new(TagNamespace::Exif, 0x9003);
    pub const COLOR_SPACE: Self = Self::new(TagNamespace::Exif, 0xA001);
    pub const INTEROP_INDEX: Self = Self::new(TagNamespace::Interop, 0x0001);
    pub const GPS_VERSION_ID: Self = Self::new(TagNamespace::Gps, 0x0000);
    pub const GPS_LATITUDE_REF: Self = Self::new(TagNamespace::Gps, 0x0001);
    pub const GPS_LATITUDE: Self = Self::new(TagNamespace::Gps, 0x0002);
    pub const GPS_LONGITUDE_REF: Self = Self::new(TagNamespace::Gps, 0x0003);
    pub const GPS_LONGITUDE: Self = Self::new(TagNamespace::Gps, 0x0004);

    pub const fn new(namespace: TagNamespace, id: u16) -> Self {
        Self { namespace, id }
    }
}

impl fmt::Display for MetadataTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#06x}", self.namespace, self.id)
    }
}

/// A tag value, mirroring the TIFF field types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Byte(Vec<u8>),
    /// NUL-free ASCII strings; one field may hold several.
    Ascii(Vec<Vec<u8>>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    /// (numerator, denominator) pairs.
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl TagValue {
    /// A single ASCII string value.
    pub fn ascii(text: &str) -> Self {
        TagValue::Ascii(vec![text.as_bytes().to_vec()])
    }

    /// First string of an ASCII value, if this is one.
    pub fn as_text(&self) -> Option<String> {
        match self {
            TagValue::Ascii(strings) => strings
                .first()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
            _ => None,
        }
    }
}

/// Ordered mapping from tag to value. Insertion order is preserved so an
/// unfiltered set is written back in the order it was read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSet {
    entries: Vec<(MetadataTag, TagValue)>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing an existing entry for the same tag in place.
    pub fn insert(&mut self, tag: MetadataTag, value: TagValue) {
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    pub fn get(&self, tag: &MetadataTag) -> Option<&TagValue> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, tag: &MetadataTag) -> bool {
        self.get(tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataTag, &TagValue)> {
        self.entries.iter().map(|(tag, value)| (tag, value))
    }

    /// Entries belonging to one namespace, in order.
    pub fn namespace(
        &self,
        namespace: TagNamespace,
    ) -> impl Iterator<Item = (&MetadataTag, &TagValue)> {
        self.iter().filter(move |(tag, _)| tag.namespace == namespace)
    }

    /// Whether every entry of `self` appears, unchanged, in `other`.
    pub fn is_subset_of(&self, other: &MetadataSet) -> bool {
        self.iter().all(|(tag, value)| other.get(tag) == Some(value))
    }

    pub(crate) fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&MetadataTag) -> bool,
    {
        self.entries.retain(|(tag, _)| keep(tag));
    }
}

impl FromIterator<(MetadataTag, TagValue)> for MetadataSet {
    fn from_iter<I: IntoIterator<Item = (MetadataTag, TagValue)>>(iter: I) -> Self {
        let mut set = MetadataSet::new();
        for (tag, value) in iter {
            set.insert(tag, value);
        }
        set
    }
}
