//! What a scan hands back to its caller.

use super::cost::CostEstimate;
use crate::core::comparator::PhotoGroup;
use crate::core::narrowing::NarrowingDebug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter names reported in [`StageMetrics::counts`]
pub mod counters {
    pub const SELECTED_IMAGES: &str = "selected_images";
    pub const CANDIDATE_SETS: &str = "candidate_sets";
    pub const CANDIDATE_ITEMS: &str = "candidate_items";
    pub const FALLBACK_TRIGGERED: &str = "fallback_triggered";
    pub const FALLBACK_CANDIDATE_ITEMS: &str = "fallback_candidate_items";
    pub const BYTE_HASHES: &str = "byte_hashes";
    pub const PERCEPTUAL_HASHES: &str = "perceptual_hashes";
    pub const COMPARISONS_EXECUTED: &str = "comparisons_executed";
    pub const DOWNLOADS_PERFORMED: &str = "downloads_performed";
    pub const REASON_MISSING_DIMS: &str = "narrowing_reason_dropped_missing_dims";
    pub const REASON_TIME_BUCKET: &str = "narrowing_reason_time_bucket_mismatch";
    pub const REASON_MIME: &str = "narrowing_reason_mime_mismatch";
}

/// Stage names reported in [`StageMetrics::timings_ms`]
pub mod timings {
    pub const CANDIDATE_NARROWING: &str = "candidate_narrowing_ms";
    pub const BYTE_HASHING: &str = "byte_hashing_ms";
    pub const EXACT_GROUPING: &str = "exact_grouping_ms";
    pub const PERCEPTUAL_HASHING: &str = "perceptual_hashing_ms";
}

/// Per-stage timings and counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetrics {
    pub timings_ms: BTreeMap<String, f64>,
    pub counts: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<ScanDebug>,
}

impl StageMetrics {
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn set_count(&mut self, name: &str, value: usize) {
        self.counts.insert(name.to_string(), value as u64);
    }

    pub(crate) fn set_timing(&mut self, name: &str, millis: f64) {
        self.timings_ms.insert(name.to_string(), millis);
    }
}

/// Explain-mode diagnostics from candidate narrowing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDebug {
    /// Bucket size -> number of buckets of that size
    pub candidate_bucket_sizes: BTreeMap<usize, usize>,
    /// Set only when narrowing produced no candidate sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_sets_empty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrowing_reasons: Option<NarrowingReasons>,
}

/// Ids that narrowing isolated, by reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowingReasons {
    pub missing_dims: Vec<String>,
    pub time_bucket_mismatch: Vec<String>,
    pub mime_mismatch: Vec<String>,
}

impl ScanDebug {
    /// Build the payload; the reasons are only included when narrowing
    /// (before any fallback) found nothing.
    pub fn from_narrowing(debug: NarrowingDebug, narrowing_found_sets: bool) -> Self {
        if narrowing_found_sets {
            return Self {
                candidate_bucket_sizes: debug.bucket_size_counts,
                ..Self::default()
            };
        }
        Self {
            candidate_bucket_sizes: debug.bucket_size_counts,
            candidate_sets_empty: Some(true),
            narrowing_reasons: Some(NarrowingReasons {
                missing_dims: debug.missing_dims_ids,
                time_bucket_mismatch: debug.time_bucket_mismatch_ids,
                mime_mismatch: debug.mime_mismatch_ids,
            }),
        }
    }
}

/// The engine's only output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Unique per invocation
    pub run_id: String,
    pub input_count: usize,
    pub stage_metrics: StageMetrics,
    pub cost_estimate: CostEstimate,
    pub groups_exact: Vec<PhotoGroup>,
    pub groups_very_similar: Vec<PhotoGroup>,
    pub groups_possibly_similar: Vec<PhotoGroup>,
}

impl ScanResult {
    /// Every group, exact first
    pub fn all_groups(&self) -> impl Iterator<Item = &PhotoGroup> {
        self.groups_exact
            .iter()
            .chain(&self.groups_very_similar)
            .chain(&self.groups_possibly_similar)
    }

    pub fn group_count(&self) -> usize {
        self.groups_exact.len() + self.groups_very_similar.len() + self.groups_possibly_similar.len()
    }
}
