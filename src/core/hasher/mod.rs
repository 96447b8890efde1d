//! # Hasher Module
//!
//! Turns downloaded photo bytes into the two kinds of hash the grouper needs.
//!
//! ## Hashes
//! - **Content digest** - SHA-256 over the raw bytes; equal digests mean
//!   byte-identical files
//! - **dHash (Difference Hash)** - brightness gradients, 64 bits
//! - **pHash (Perceptual Hash)** - DCT mean hash, 64 bits
//!
//! Near-duplicates must agree on both perceptual signatures, which is why
//! the two algorithms look at the image so differently.
//!
//! ## Decoding
//! JPEG goes through `zune-jpeg`, everything else through `image`. The
//! dHash grid is produced by `fast_image_resize`.
//!
//! ## Example
//! ```rust,ignore
//! let hashing = HashingService::new(download_client);
//! let digest = hashing.byte_hash(&photo)?;
//! let pair = hashing.perceptual_hashes(&photo)?;
//! ```

mod algorithms;
mod content;
pub mod fast_decode;
pub mod fast_resize;
mod traits;

pub use algorithms::{DifferenceHasher, PerceptualHasher};
pub use content::content_digest;
pub use traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};

use crate::core::download::DownloadClient;
use crate::core::photo::PhotoItem;
use crate::error::Result;
use fast_decode::FastDecoder;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Side length of the hash grid; 8 gives 64-bit signatures
pub const HASH_SIZE: u32 = 8;

/// dHash and pHash of one photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualPair {
    pub dhash: ImageHashValue,
    pub phash: ImageHashValue,
}

impl PerceptualPair {
    /// Hamming distances to another pair as `(dhash, phash)`
    pub fn distances(&self, other: &PerceptualPair) -> (u32, u32) {
        (
            self.dhash.distance(&other.dhash),
            self.phash.distance(&other.phash),
        )
    }
}

/// Hashing backed by a run's download client.
///
/// Photos without a download URL must be filtered out before they get
/// here; the download client rejects them.
pub struct HashingService {
    downloads: DownloadClient,
    dhasher: DifferenceHasher,
    phasher: PerceptualHasher,
    byte_hashes: AtomicUsize,
    perceptual_hashes: AtomicUsize,
}

impl HashingService {
    pub fn new(downloads: DownloadClient) -> Self {
        Self {
            downloads,
            dhasher: DifferenceHasher::new(HASH_SIZE),
            phasher: PerceptualHasher::new(HASH_SIZE),
            byte_hashes: AtomicUsize::new(0),
            perceptual_hashes: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> &DownloadClient {
        &self.downloads
    }

    /// SHA-256 hex digest of the photo's bytes
    pub fn byte_hash(&self, photo: &PhotoItem) -> Result<String> {
        let bytes = self.downloads.fetch(photo)?;
        let digest = content_digest(&bytes);
        self.byte_hashes.fetch_add(1, Ordering::Relaxed);
        Ok(digest)
    }

    /// dHash and pHash of the decoded photo
    pub fn perceptual_hashes(&self, photo: &PhotoItem) -> Result<PerceptualPair> {
        let bytes = self.downloads.fetch(photo)?;
        let image = FastDecoder::decode(&bytes, &photo.id)?;
        let pair = PerceptualPair {
            dhash: self.dhasher.hash_image(&image)?,
            phash: self.phasher.hash_image(&image)?,
        };
        self.perceptual_hashes.fetch_add(1, Ordering::Relaxed);
        Ok(pair)
    }

    pub fn byte_hash_count(&self) -> usize {
        self.byte_hashes.load(Ordering::Relaxed)
    }

    /// Number of (dHash, pHash) pairs computed
    pub fn perceptual_hash_count(&self) -> usize {
        self.perceptual_hashes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::download::{
        DownloadPolicy, FixtureSource, GlobalOnlyResolver, HttpFetcher, SystemResolver,
    };
    use std::collections::HashSet;
    use chrono::{TimeZone, Utc};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn write_png(dir: &Path, id: &str, shift: u32) {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |x, y| {
            let v = (((x + shift) * 4 + y) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        }));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        std::fs::write(dir.join(format!("{id}.png")), bytes).unwrap();
    }

    fn service(dir: &Path) -> HashingService {
        let client = DownloadClient::new(
            DownloadPolicy::default(),
            Some(FixtureSource::new(dir, true)),
            Arc::new(
                HttpFetcher::new(
                    Duration::from_secs(1),
                    GlobalOnlyResolver::new(Arc::new(SystemResolver), HashSet::new()),
                )
                .unwrap(),
            ),
            Arc::new(SystemResolver),
        );
        HashingService::new(client)
    }

    fn photo(id: &str) -> PhotoItem {
        PhotoItem::new(id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn identical_bytes_share_digest() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a", 0);
        write_png(dir.path(), "b", 0);
        let hashing = service(dir.path());

        let a = hashing.byte_hash(&photo("a")).unwrap();
        let b = hashing.byte_hash(&photo("b")).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(hashing.byte_hash_count(), 2);
    }

    #[test]
    fn perceptual_hashes_reuse_download() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a", 0);
        let hashing = service(dir.path());

        hashing.byte_hash(&photo("a")).unwrap();
        let pair = hashing.perceptual_hashes(&photo("a")).unwrap();

        assert_eq!(pair.dhash.algorithm(), HashAlgorithmKind::Difference);
        assert_eq!(pair.phash.algorithm(), HashAlgorithmKind::Perceptual);
        assert_eq!(pair.distances(&pair), (0, 0));
        assert_eq!(hashing.downloads().download_count(), 1);
        assert_eq!(hashing.perceptual_hash_count(), 1);
    }

    #[test]
    fn undecodable_bytes_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("junk.jpg"), b"not really a jpeg").unwrap();
        let hashing = service(dir.path());

        assert!(hashing.perceptual_hashes(&photo("junk")).is_err());
        assert_eq!(hashing.perceptual_hash_count(), 0);
    }
}
