//! # Photo Prune Engine
//!
//! Finds exact and near-duplicate photos in a batch selected by a user and
//! explains the result.
//!
//! ## Core Philosophy
//! - **Never delete** - The engine only reports groups; people decide
//! - **Never trust a URL** - Photo bytes come from an untrusted media service
//! - **Show the work** - Every run reports stage timings, counters and cost
//!
//! ## Architecture
//! - `core` - Narrowing, downloading, hashing, grouping and orchestration
//! - `config` - Settings and per-run capabilities
//! - `events` - Progress reporting over channels
//! - `error` - User-safe error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::config::ScanSettings;
pub use crate::core::pipeline::{run_scan, ScanEngine, ScanResult};
pub use crate::error::{EngineError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Logs go to stderr
/// so JSON output on stdout stays clean. Calling it twice is harmless.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
