//! Trait definitions for comparison strategies.

use serde::{Deserialize, Serialize};

/// How close two photos are, judged on both perceptual signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SimilarityTier {
    /// Both distances within the tight ceilings
    VerySimilar,
    /// Both distances within the loose ceilings, at least one outside the tight one
    PossiblySimilar,
}

impl std::fmt::Display for SimilarityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityTier::VerySimilar => write!(f, "Very Similar"),
            SimilarityTier::PossiblySimilar => write!(f, "Possibly Similar"),
        }
    }
}

/// Strategy trait for classifying a compared pair
pub trait ComparisonStrategy: Send + Sync {
    /// Classify a pair from its dHash and pHash Hamming distances.
    /// `None` means the pair is not similar at all.
    fn classify(&self, dhash_distance: u32, phash_distance: u32) -> Option<SimilarityTier>;
}

/// Hamming-distance ceilings for the two similarity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    pub dhash_very: u32,
    pub dhash_possible: u32,
    pub phash_very: u32,
    pub phash_possible: u32,
}

impl ComparisonStrategy for SimilarityThresholds {
    fn classify(&self, dhash_distance: u32, phash_distance: u32) -> Option<SimilarityTier> {
        if dhash_distance <= self.dhash_very && phash_distance <= self.phash_very {
            Some(SimilarityTier::VerySimilar)
        } else if dhash_distance <= self.dhash_possible && phash_distance <= self.phash_possible {
            Some(SimilarityTier::PossiblySimilar)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> SimilarityThresholds {
        SimilarityThresholds {
            dhash_very: 5,
            dhash_possible: 10,
            phash_very: 6,
            phash_possible: 12,
        }
    }

    #[test]
    fn both_within_very_is_very_similar() {
        assert_eq!(thresholds().classify(4, 5), Some(SimilarityTier::VerySimilar));
        assert_eq!(thresholds().classify(5, 6), Some(SimilarityTier::VerySimilar));
    }

    #[test]
    fn one_signature_outside_very_drops_to_possible() {
        assert_eq!(thresholds().classify(8, 7), Some(SimilarityTier::PossiblySimilar));
        assert_eq!(thresholds().classify(2, 7), Some(SimilarityTier::PossiblySimilar));
    }

    #[test]
    fn both_signatures_must_agree() {
        assert_eq!(thresholds().classify(0, 13), None);
        assert_eq!(thresholds().classify(11, 0), None);
    }
}
