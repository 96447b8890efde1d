//! # Narrowing Module
//!
//! Splits a selection into candidate sets so that later stages only
//! compare photos that could plausibly be duplicates.
//!
//! ## Bucket Key
//! | Part        | Values                                        |
//! |-------------|-----------------------------------------------|
//! | Day         | UTC calendar day of `create_time`             |
//! | Aspect      | landscape (>= 1.2), portrait (<= 0.8), square |
//! | Resolution  | floored megapixels, e.g. `12mp`               |
//!
//! Missing or zero dimensions map to `unknown` for both aspect and
//! resolution instead of failing.
//!
//! The diagnostics are an optional side channel: passing `None` skips
//! them, passing `Some` fills them in. Either way the candidate sets are
//! produced by the same code path.

use crate::core::photo::PhotoItem;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Photos sorted by `(create_time, id)`, at least two of them
pub type CandidateSet = Vec<PhotoItem>;

const LANDSCAPE_MIN_RATIO: f64 = 1.2;
const PORTRAIT_MAX_RATIO: f64 = 0.8;

/// Aspect-ratio class of a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClass {
    Landscape,
    Portrait,
    Square,
    Unknown,
}

impl AspectClass {
    pub fn classify(dimensions: Option<(u32, u32)>) -> Self {
        let Some((width, height)) = dimensions else {
            return AspectClass::Unknown;
        };
        let ratio = width as f64 / height as f64;
        if ratio >= LANDSCAPE_MIN_RATIO {
            AspectClass::Landscape
        } else if ratio <= PORTRAIT_MAX_RATIO {
            AspectClass::Portrait
        } else {
            AspectClass::Square
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectClass::Landscape => write!(f, "landscape"),
            AspectClass::Portrait => write!(f, "portrait"),
            AspectClass::Square => write!(f, "square"),
            AspectClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Resolution class of a photo, in whole megapixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionClass {
    Megapixels(u64),
    Unknown,
}

impl ResolutionClass {
    pub fn classify(dimensions: Option<(u32, u32)>) -> Self {
        match dimensions {
            Some((width, height)) => {
                ResolutionClass::Megapixels(u64::from(width) * u64::from(height) / 1_000_000)
            }
            None => ResolutionClass::Unknown,
        }
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionClass::Megapixels(mp) => write!(f, "{}mp", mp),
            ResolutionClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// The key photos are bucketed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub day: NaiveDate,
    pub aspect: AspectClass,
    pub resolution: ResolutionClass,
}

impl BucketKey {
    pub fn for_photo(photo: &PhotoItem) -> Self {
        let dimensions = photo.dimensions();
        Self {
            day: photo.capture_day(),
            aspect: AspectClass::classify(dimensions),
            resolution: ResolutionClass::classify(dimensions),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.day, self.aspect, self.resolution)
    }
}

/// Why photos did or did not end up together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowingDebug {
    /// Bucket size -> number of buckets with that size
    pub bucket_size_counts: BTreeMap<usize, usize>,
    /// Photos without usable width/height
    pub missing_dims_ids: Vec<String>,
    /// Photos alone on their capture day
    pub time_bucket_mismatch_ids: Vec<String>,
    /// Photos alone with their mime type
    pub mime_mismatch_ids: Vec<String>,
}

fn mime_bucket(photo: &PhotoItem) -> &str {
    photo
        .mime_type
        .as_deref()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("unknown")
}

/// Bucket photos and return every bucket with two or more members.
///
/// Candidate sets come out ordered by the bucket key's text form (so
/// `10mp` sorts before `2mp`), members by `(create_time, id)`. When `debug` is provided it is overwritten with
/// the diagnostics for this input.
pub fn narrow(photos: &[PhotoItem], debug: Option<&mut NarrowingDebug>) -> Vec<CandidateSet> {
    let mut buckets: BTreeMap<String, Vec<&PhotoItem>> = BTreeMap::new();
    for photo in photos {
        buckets
            .entry(BucketKey::for_photo(photo).to_string())
            .or_default()
            .push(photo);
    }

    let mut bucket_size_counts: BTreeMap<usize, usize> = BTreeMap::new();
    let mut candidate_sets = Vec::new();
    for members in buckets.into_values() {
        *bucket_size_counts.entry(members.len()).or_insert(0) += 1;
        if members.len() < 2 {
            continue;
        }
        let mut set: CandidateSet = members.into_iter().cloned().collect();
        set.sort_by(|a, b| a.chronological_cmp(b));
        candidate_sets.push(set);
    }

    if let Some(debug) = debug {
        *debug = diagnose(photos, bucket_size_counts);
    }

    candidate_sets
}

fn diagnose(photos: &[PhotoItem], bucket_size_counts: BTreeMap<usize, usize>) -> NarrowingDebug {
    let mut day_counts: HashMap<NaiveDate, usize> = HashMap::new();
    let mut mime_counts: HashMap<&str, usize> = HashMap::new();
    for photo in photos {
        *day_counts.entry(photo.capture_day()).or_insert(0) += 1;
        *mime_counts.entry(mime_bucket(photo)).or_insert(0) += 1;
    }

    let missing_dims_ids = photos
        .iter()
        .filter(|p| p.dimensions().is_none())
        .map(|p| p.id.clone())
        .collect();
    let time_bucket_mismatch_ids = photos
        .iter()
        .filter(|p| day_counts.get(&p.capture_day()).copied().unwrap_or(0) <= 1)
        .map(|p| p.id.clone())
        .collect();
    let mime_mismatch_ids = photos
        .iter()
        .filter(|p| mime_counts.get(mime_bucket(p)).copied().unwrap_or(0) <= 1)
        .map(|p| p.id.clone())
        .collect();

    NarrowingDebug {
        bucket_size_counts,
        missing_dims_ids,
        time_bucket_mismatch_ids,
        mime_mismatch_ids,
    }
}

/// Total number of photos across candidate sets
pub fn candidate_item_count(sets: &[CandidateSet]) -> usize {
    sets.iter().map(Vec::len).sum()
}
