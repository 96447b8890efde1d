//! Monetary cost model for a scan.

use serde::{Deserialize, Serialize};

/// Price per unit of work
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub per_download: f64,
    pub per_byte_hash: f64,
    pub per_perceptual_hash: f64,
    pub per_comparison: f64,
}

/// Units of work a scan performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkCounts {
    pub downloads: usize,
    pub byte_hashes: usize,
    pub perceptual_hashes: usize,
    pub comparisons: usize,
}

/// Cost of a scan, each figure rounded to 6 decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub download_cost: f64,
    pub hash_cost: f64,
    pub comparison_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn from_counts(rates: &CostRates, work: &WorkCounts) -> Self {
        let download_cost = work.downloads as f64 * rates.per_download;
        let hash_cost = work.byte_hashes as f64 * rates.per_byte_hash
            + work.perceptual_hashes as f64 * rates.per_perceptual_hash;
        let comparison_cost = work.comparisons as f64 * rates.per_comparison;
        let total_cost = download_cost + hash_cost + comparison_cost;

        Self {
            download_cost: round_to(download_cost, 6),
            hash_cost: round_to(hash_cost, 6),
            comparison_cost: round_to(comparison_cost, 6),
            total_cost: round_to(total_cost, 6),
        }
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
