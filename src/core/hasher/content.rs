//! Content digests for exact-duplicate detection.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the raw photo bytes
pub fn content_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
