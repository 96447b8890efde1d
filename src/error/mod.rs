//! # Error Module
//!
//! User-safe error types for the similarity-scan engine.
//!
//! ## Design Principles
//! - **Never panic** on caller data - return errors instead
//! - **Name the host, never the URL** - download URLs carry signed tokens
//! - **Recovery hints** - download failures end with the same guidance text
//! - **No partial results** - any error aborts the whole run

use thiserror::Error;

/// Remediation text appended to every download-related failure.
pub const DOWNLOAD_GUIDANCE: &str = "Make sure the photo URLs point at an allowed media host, \
or set scan_fixture_bytes_dir to load photo bytes from disk (non-production only).";

/// Top-level engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Fixture(#[from] FixtureError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the failure was caused by the caller's input and should be
    /// reported back as a client error rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::Transport(_) | EngineError::Fixture(_)
        )
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(error: config::ConfigError) -> Self {
        EngineError::Config(error.to_string())
    }
}

/// A photo or its download URL was rejected before any bytes were fetched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Download URL host '{host}' is not allowed. {}", DOWNLOAD_GUIDANCE)]
    BlockedHost { host: String },

    #[error("Download URL for host '{host}' must use https. {}", DOWNLOAD_GUIDANCE)]
    InsecureScheme { host: String },

    #[error("Download URL is missing a hostname. {}", DOWNLOAD_GUIDANCE)]
    MissingHostname,

    #[error("Download URL host '{host}' is not allowed. {}", DOWNLOAD_GUIDANCE)]
    HostNotAllowed { host: String },

    #[error("Download URL host '{host}' resolves to a non-global address. {}", DOWNLOAD_GUIDANCE)]
    NonGlobalAddress { host: String },

    #[error("Download URL host '{host}' could not be resolved. {}", DOWNLOAD_GUIDANCE)]
    UnresolvableHost { host: String },

    #[error("Photo {photo_id} is missing a download URL")]
    MissingDownloadUrl { photo_id: String },

    #[error("Photo {photo_id} has a malformed download URL. {}", DOWNLOAD_GUIDANCE)]
    MalformedUrl { photo_id: String },

    #[error("Fixture bytes mode does not allow path-like photo ids")]
    PathLikeId,

    #[error("Photo id {photo_id} appears more than once in the selection")]
    DuplicatePhotoId { photo_id: String },
}

/// The media host answered with an error or could not be reached
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Download failed for host '{host}'{}. {}", status_suffix(.status), DOWNLOAD_GUIDANCE)]
pub struct TransportError {
    pub host: String,
    pub status: Option<u16>,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

/// Errors from fixture-bytes mode (local files standing in for downloads)
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error(
        "Fixture bytes missing for photo id '{photo_id}'; expected {photo_id}.jpg, \
         {photo_id}.jpeg or {photo_id}.png in scan_fixture_bytes_dir. Add the file or \
         disable scan_fixture_bytes_strict to allow a network fetch."
    )]
    Missing { photo_id: String },

    #[error("Failed to read fixture bytes for photo id '{photo_id}': {source}")]
    Io {
        photo_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while turning photo bytes into hashes
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to decode image for photo {photo_id}: {reason}")]
    Decode { photo_id: String, reason: String },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
