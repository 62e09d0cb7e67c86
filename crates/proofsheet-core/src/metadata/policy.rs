//! Metadata policies applied before encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{MetadataSet, TagNamespace};

/// Which source tags an export carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataPolicy {
    /// Keep every descriptive tag read from the source.
    #[default]
    All,
    /// Drop the GPS directory, keep everything else.
    StripGps,
    /// Write no metadata at all.
    StripAll,
}

impl MetadataPolicy {
    /// Filter a metadata set. The result is always a subset of the input;
    /// values are never rewritten.
    pub fn apply(self, mut metadata: MetadataSet) -> MetadataSet {
        match self {
            MetadataPolicy::All => metadata,
            MetadataPolicy::StripGps => {
                metadata.retain(|tag| tag.namespace != TagNamespace::Gps);
                metadata
            }
            MetadataPolicy::StripAll => MetadataSet::new(),
        }
    }
}

impl fmt::Display for MetadataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataPolicy::All => "ALL",
            MetadataPolicy::StripGps => "STRIP_GPS",
            MetadataPolicy::StripAll => "STRIP_ALL",
        };
        f.write_str(name)
    }
}

impl FromStr for MetadataPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(MetadataPolicy::All),
            "STRIP_GPS" => Ok(MetadataPolicy::StripGps),
            "STRIP_ALL" | "NONE" => Ok(MetadataPolicy::StripAll),
            other => Err(format!("unknown metadata policy '{other}'")),
        }
    }
}
