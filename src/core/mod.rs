//! # Core Module
//!
//! The similarity-scan engine, independent of any front end.
//!
//! ## Modules
//! - `photo` - The caller-supplied photo record
//! - `narrowing` - Buckets photos so only plausible pairs are compared
//! - `download` - Hardened fetching of photo bytes
//! - `hasher` - Content digests and perceptual hashes
//! - `comparator` - Exact and tiered near-duplicate grouping
//! - `pipeline` - Orchestrates a scan and assembles the result

pub mod comparator;
pub mod download;
pub mod hasher;
pub mod narrowing;
pub mod photo;
pub mod pipeline;

// Re-export commonly used types
pub use comparator::{GroupCategory, PhotoGroup, SimilarityThresholds};
pub use hasher::{HashAlgorithmKind, ImageHashValue};
pub use photo::{GpsLocation, PhotoItem};
pub use pipeline::{run_scan, CostEstimate, ScanEngine, ScanResult, StageMetrics};
