//! # Comparator Module
//!
//! Turns precomputed hashes into duplicate groups.
//!
//! ## How It Works
//! 1. Partition photos by content digest: equal digests are exact duplicates
//! 2. Within each candidate set, compare every unordered pair once
//! 3. Classify the pair on both dHash and pHash distances
//! 4. Merge qualifying pairs transitively (union-find)
//!
//! ## Tiers
//! | dHash            | pHash            | Tier              |
//! |------------------|------------------|-------------------|
//! | <= very          | <= very          | Very similar      |
//! | <= possible      | <= possible      | Possibly similar  |
//! | anything else    |                  | Not grouped       |
//!
//! A photo lands in at most one tier. Very-similar components are built
//! first; the possibly-similar pass only sees the photos they left over.

mod grouper;
mod traits;

pub use grouper::DisjointSet;
pub use traits::{ComparisonStrategy, SimilarityThresholds, SimilarityTier};

use crate::core::hasher::PerceptualPair;
use crate::core::narrowing::CandidateSet;
use crate::core::photo::PhotoItem;
use crate::events::{CompareEvent, CompareProgress, Event, EventSender};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Which collection a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupCategory {
    Exact,
    VerySimilar,
    PossiblySimilar,
}

impl GroupCategory {
    /// Prefix used in group ids
    pub fn slug(&self) -> &'static str {
        match self {
            GroupCategory::Exact => "exact",
            GroupCategory::VerySimilar => "very-similar",
            GroupCategory::PossiblySimilar => "possibly-similar",
        }
    }
}

impl std::fmt::Display for GroupCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupCategory::Exact => write!(f, "Exact"),
            GroupCategory::VerySimilar => write!(f, "Very Similar"),
            GroupCategory::PossiblySimilar => write!(f, "Possibly Similar"),
        }
    }
}

/// Oldest and newest member of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativePair {
    pub earliest: PhotoItem,
    pub latest: PhotoItem,
}

/// A group of two or more photos believed to be duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoGroup {
    /// Stable across runs for the same members
    pub group_id: String,
    pub category: GroupCategory,
    pub items: Vec<PhotoItem>,
    pub representative_pair: RepresentativePair,
}

impl PhotoGroup {
    /// Build a group; `None` if fewer than two members
    pub fn new(category: GroupCategory, items: Vec<PhotoItem>) -> Option<Self> {
        if items.len() < 2 {
            return None;
        }
        let earliest = items.iter().min_by(|a, b| a.chronological_cmp(b))?.clone();
        let latest = items.iter().max_by(|a, b| a.chronological_cmp(b))?.clone();
        Some(Self {
            group_id: group_id(category, &items),
            category,
            items,
            representative_pair: RepresentativePair { earliest, latest },
        })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// `<slug>-<first 16 hex of sha256(ids joined by '\n')>`
fn group_id(category: GroupCategory, items: &[PhotoItem]) -> String {
    let joined = items
        .iter()
        .map(|item| item.id.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let digest = Sha256::digest(joined.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", category.slug(), hex)
}

/// Partition photos by digest; partitions of two or more are exact groups.
///
/// Groups are ordered by their first member and members keep input order.
/// Photos without a digest are ignored.
pub fn exact_groups(photos: &[PhotoItem], digests: &HashMap<String, String>) -> Vec<PhotoGroup> {
    let mut slot_of_digest: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<Vec<PhotoItem>> = Vec::new();

    for photo in photos {
        let Some(digest) = digests.get(&photo.id) else {
            continue;
        };
        match slot_of_digest.get(digest.as_str()) {
            Some(&slot) => partitions[slot].push(photo.clone()),
            None => {
                slot_of_digest.insert(digest.as_str(), partitions.len());
                partitions.push(vec![photo.clone()]);
            }
        }
    }

    partitions
        .into_iter()
        .filter_map(|members| PhotoGroup::new(GroupCategory::Exact, members))
        .collect()
}

/// Output of near-duplicate grouping
#[derive(Debug, Clone, Default)]
pub struct NearDuplicateGroups {
    pub very_similar: Vec<PhotoGroup>,
    pub possibly_similar: Vec<PhotoGroup>,
    /// Unordered pairs compared, `n(n-1)/2` per candidate set
    pub comparisons: usize,
}

/// Tiered near-duplicate groups over candidate sets.
///
/// Every id in `sets` must have an entry in `hashes`.
pub fn near_duplicate_groups(
    sets: &[CandidateSet],
    hashes: &HashMap<String, PerceptualPair>,
    strategy: &dyn ComparisonStrategy,
) -> NearDuplicateGroups {
    near_duplicate_groups_with_events(sets, hashes, strategy, &crate::events::null_sender())
}

/// Tiered near-duplicate grouping with progress events
///
/// Emits progress events every ~1000 comparisons.
pub fn near_duplicate_groups_with_events(
    sets: &[CandidateSet],
    hashes: &HashMap<String, PerceptualPair>,
    strategy: &dyn ComparisonStrategy,
    events: &EventSender,
) -> NearDuplicateGroups {
    let total_comparisons: usize = sets.iter().map(|set| pair_count(set.len())).sum();
    events.send(Event::Compare(CompareEvent::Started {
        candidate_sets: sets.len(),
        total_comparisons,
    }));

    let update_interval = std::cmp::min(1000, std::cmp::max(1, total_comparisons / 50));
    let mut result = NearDuplicateGroups::default();
    let mut last_progress_update = 0;

    for set in sets {
        let tiers = classify_pairs(set, hashes, strategy);
        result.comparisons += pair_count(set.len());

        // very-similar components first
        let mut very = DisjointSet::new(set.len());
        for &(i, j, tier) in &tiers {
            if tier == SimilarityTier::VerySimilar {
                very.union(i, j);
            }
        }
        let very_components = very.components();
        let mut claimed = vec![false; set.len()];
        for component in &very_components {
            for &position in component {
                claimed[position] = true;
            }
        }

        // possibly-similar-or-better pairs among what is left
        let mut possible = DisjointSet::new(set.len());
        for &(i, j, _) in &tiers {
            if !claimed[i] && !claimed[j] {
                possible.union(i, j);
            }
        }

        result
            .very_similar
            .extend(materialize(set, very_components, GroupCategory::VerySimilar));
        result.possibly_similar.extend(materialize(
            set,
            possible.components(),
            GroupCategory::PossiblySimilar,
        ));

        if result.comparisons - last_progress_update >= update_interval {
            events.send(Event::Compare(CompareEvent::Progress(CompareProgress {
                comparisons_completed: result.comparisons,
                total_comparisons,
            })));
            last_progress_update = result.comparisons;
        }
    }

    events.send(Event::Compare(CompareEvent::Completed {
        very_similar_groups: result.very_similar.len(),
        possibly_similar_groups: result.possibly_similar.len(),
    }));

    result
}

fn pair_count(len: usize) -> usize {
    len * len.saturating_sub(1) / 2
}

/// Every qualifying unordered pair `(i, j, tier)` with `i < j`
fn classify_pairs(
    set: &[PhotoItem],
    hashes: &HashMap<String, PerceptualPair>,
    strategy: &dyn ComparisonStrategy,
) -> Vec<(usize, usize, SimilarityTier)> {
    let pairs: Vec<Option<&PerceptualPair>> = set.iter().map(|photo| hashes.get(&photo.id)).collect();
    let mut tiers = Vec::new();

    for i in 0..set.len() {
        for j in (i + 1)..set.len() {
            let (Some(hash_a), Some(hash_b)) = (pairs[i], pairs[j]) else {
                continue;
            };
            let (dhash_distance, phash_distance) = hash_a.distances(hash_b);
            if let Some(tier) = strategy.classify(dhash_distance, phash_distance) {
                tiers.push((i, j, tier));
            }
        }
    }

    tiers
}

fn materialize(
    set: &[PhotoItem],
    components: Vec<Vec<usize>>,
    category: GroupCategory,
) -> Vec<PhotoGroup> {
    components
        .into_iter()
        .filter_map(|positions| {
            let mut members: Vec<PhotoItem> =
                positions.into_iter().map(|position| set[position].clone()).collect();
            crate::core::photo::sort_chronologically(&mut members);
            PhotoGroup::new(category, members)
        })
        .collect()
}
