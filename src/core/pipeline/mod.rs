//! # Pipeline Module
//!
//! Orchestrates a similarity scan over one batch of photos.
//!
//! ## Pipeline Stages
//! 1. **Narrow** - Bucket photos so only plausible pairs are compared
//! 2. **Fallback** - Compare a small batch as a whole if narrowing found nothing
//! 3. **Byte hash** - Content digest of every downloadable photo
//! 4. **Exact groups** - Photos sharing a digest
//! 5. **Perceptual hash + compare** - Remaining candidates, tiered
//! 6. **Finalize** - Cost estimate, metrics, result
//!
//! ## Parallelism
//! Uses a rayon pool of `scan_download_workers` threads for both hashing
//! stages. Stages themselves run strictly one after another.

mod cost;
mod executor;
mod result;

pub use cost::{round_to, CostEstimate, CostRates, WorkCounts};
pub use executor::{
    hashable_candidate_sets, run_scan, small_input_fallback, ScanEngine, ScanEngineBuilder,
};
pub use result::{counters, timings, NarrowingReasons, ScanDebug, ScanResult, StageMetrics};
