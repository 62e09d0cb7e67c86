//! Phase B: encoded byte budget.

use crate::decode::{resize, scale_dimensions, FilterType, Image};
use crate::encode::{encode, EncodeError, OutputFormat};
use crate::metadata::MetadataSet;

use super::{BudgetStatus, ResolveError, ResolverConfig};

/// The image and bytes chosen by [`fit_byte_budget`].
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The image that was encoded; smaller than the input if shrinking ran
    pub image: Image,
    pub bytes: Vec<u8>,
    /// Effective JPEG quality; `None` for lossless formats
    pub quality: Option<u8>,
    pub status: BudgetStatus,
    /// Number of encoder invocations spent
    pub encodes: u32,
}

/// Outcome of a quality search at fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySearch {
    /// Highest quality whose encoding fits, with its bytes
    pub best_fit: Option<(u8, Vec<u8>)>,
    /// Smallest encoding seen, with its quality
    pub smallest: (u8, Vec<u8>),
    pub encodes: u32,
}

/// Find the highest quality in `1..=start` whose encoding fits `budget`.
///
/// `start` is tried first. If it is over budget, the search keeps an
/// interval whose lower end fits (0 standing in for "nothing tried fits
/// yet") and whose upper end is a tested quality that does not, halving it
/// until the ends are adjacent. When a fit is found at `q < start`, `q + 1`
/// was therefore encoded and rejected.
///
/// # Errors
///
/// Propagates the first encoder error.
pub fn search_quality<F>(start: u8, budget: u64, mut encode_at: F) -> Result<QualitySearch, EncodeError>
where
    F: FnMut(u8) -> Result<Vec<u8>, EncodeError>,
{
    let start = start.clamp(1, 100);
    let first = encode_at(start)?;
    let mut encodes = 1;

    if first.len() as u64 <= budget {
        return Ok(QualitySearch {
            best_fit: Some((start, first.clone())),
            smallest: (start, first),
            encodes,
        });
    }

    let mut smallest = (start, first);
    let mut best_fit = None;
    let (mut lo, mut hi) = (0u8, start);

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        let bytes = encode_at(mid)?;
        encodes += 1;
        tracing::trace!(quality = mid, len = bytes.len(), budget, "quality probe");

        if bytes.len() < smallest.1.len() {
            smallest = (mid, bytes.clone());
        }
        if bytes.len() as u64 <= budget {
            lo = mid;
            best_fit = Some((mid, bytes));
        } else {
            hi = mid;
        }
    }

    Ok(QualitySearch {
        best_fit,
        smallest,
        encodes,
    })
}

/// Encode `image` so the output fits `max_bytes`, if possible.
///
/// - No budget: encode once at `quality`.
/// - JPEG: [`search_quality`] from `quality` down. If even quality 1 is over
///   budget and `config.downscale_lossy` is set, shrink at quality 1.
/// - PNG/TIFF: encode at full size, then shrink by `shrink_factor^k` for
///   `k = 1..=max_shrink_rounds`, stopping at the first fit.
///
/// When nothing fits, the smallest encoding is returned with
/// `BudgetStatus::Unattainable`.
///
/// # Errors
///
/// Returns `ResolveError` if encoding or resampling fails.
pub fn fit_byte_budget(
    image: Image,
    metadata: &MetadataSet,
    format: OutputFormat,
    quality: u8,
    max_bytes: Option<u64>,
    config: &ResolverConfig,
) -> Result<Resolved, ResolveError> {
    let effective = |q: u8| format.is_lossy().then_some(q);

    let Some(budget) = max_bytes else {
        let bytes = encode(&image, metadata, format, quality)?;
        return Ok(Resolved {
            image,
            bytes,
            quality: effective(quality),
            status: BudgetStatus::Unconstrained,
            encodes: 1,
        });
    };

    if format.is_lossy() {
        let search = search_quality(quality, budget, |q| encode(&image, metadata, format, q))?;
        if let Some((q, bytes)) = search.best_fit {
            tracing::debug!(quality = q, len = bytes.len(), budget, "quality search met budget");
            return Ok(Resolved {
                image,
                bytes,
                quality: Some(q),
                status: BudgetStatus::Met,
                encodes: search.encodes,
            });
        }

        let (smallest_q, smallest_bytes) = search.smallest;
        if !config.downscale_lossy {
            return Ok(unattainable(image, smallest_bytes, Some(smallest_q), budget, search.encodes));
        }

        let floor = Candidate {
            image: image.clone(),
            bytes: smallest_bytes,
            quality: smallest_q,
        };
        let mut shrunk = shrink_to_budget(&image, budget, config, floor, |img| {
            encode(img, metadata, format, 1).map(|bytes| (1, bytes))
        })?;
        shrunk.encodes += search.encodes;
        return Ok(shrunk);
    }

    let bytes = encode(&image, metadata, format, quality)?;
    if bytes.len() as u64 <= budget {
        return Ok(Resolved {
            image,
            bytes,
            quality: None,
            status: BudgetStatus::Met,
            encodes: 1,
        });
    }

    let floor = Candidate {
        image: image.clone(),
        bytes,
        quality,
    };
    let mut shrunk = shrink_to_budget(&image, budget, config, floor, |img| {
        encode(img, metadata, format, quality).map(|bytes| (quality, bytes))
    })?;
    shrunk.encodes += 1;
    shrunk.quality = None;
    Ok(shrunk)
}

struct Candidate {
    image: Image,
    bytes: Vec<u8>,
    quality: u8,
}

/// Re-encode progressively smaller copies of `base` until one fits.
///
/// `smallest` is the best over-budget candidate seen before shrinking.
/// `encodes` in the result counts only encodes made here.
fn shrink_to_budget<F>(
    base: &Image,
    budget: u64,
    config: &ResolverConfig,
    mut smallest: Candidate,
    mut encode_at: F,
) -> Result<Resolved, ResolveError>
where
    F: FnMut(&Image) -> Result<(u8, Vec<u8>), EncodeError>,
{
    let (base_w, base_h) = base.dimensions();
    let mut last_dims = (base_w, base_h);
    let mut encodes = 0;

    for round in 1..=config.max_shrink_rounds {
        if last_dims == (1, 1) {
            tracing::debug!(round, "image cannot shrink further");
            break;
        }
        let factor = config.shrink_factor.powi(round as i32);
        let dims = scale_dimensions(base_w, base_h, factor);
        // Small sides can round back to the previous size; a later power may still shrink them.
        if dims == last_dims {
            continue;
        }
        last_dims = dims;

        let image = resize(base, dims.0, dims.1, FilterType::Lanczos3)?;
        let (quality, bytes) = encode_at(&image)?;
        encodes += 1;
        tracing::trace!(round, width = dims.0, height = dims.1, len = bytes.len(), budget, "shrink probe");

        if bytes.len() as u64 <= budget {
            tracing::debug!(round, width = dims.0, height = dims.1, len = bytes.len(), "shrinking met budget");
            return Ok(Resolved {
                image,
                bytes,
                quality: Some(quality),
                status: BudgetStatus::Met,
                encodes,
            });
        }
        if bytes.len() < smallest.bytes.len() {
            smallest = Candidate {
                image,
                bytes,
                quality,
            };
        }
    }

    Ok(unattainable(
        smallest.image,
        smallest.bytes,
        Some(smallest.quality),
        budget,
        encodes,
    ))
}

fn unattainable(image: Image, bytes: Vec<u8>, quality: Option<u8>, budget: u64, encodes: u32) -> Resolved {
    let achieved = bytes.len() as u64;
    Resolved {
        image,
        bytes,
        quality,
        status: BudgetStatus::Unattainable { budget, achieved },
        encodes,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: with a monotone encoder, the search returns the highest
        /// fitting quality using at most ceil(log2(start)) extra encodes.
        #[test]
        fn prop_search_is_tight(start in 1u8..=100, step in 1usize..=500, budget in 0u64..=60_000) {
            let search = search_quality(start, budget, |q| Ok(vec![0; usize::from(q) * step])).unwrap();

            let fits = |q: u8| (usize::from(q) * step) as u64 <= budget;
            let expected = (1..=start).rev().find(|&q| fits(q));
            prop_assert_eq!(search.best_fit.as_ref().map(|(q, _)| *q), expected);

            let max_extra = (f64::from(start)).log2().ceil() as u32;
            prop_assert!(search.encodes <= 1 + max_extra);
        }
    }
}
