//! pHash via image_hasher's DCT preprocessing and mean hash.
//!
//! dHash watches neighbouring pixels; pHash watches overall structure.
//! Requiring both to agree keeps crops and re-exports of different shots
//! apart.

use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    /// `hash_size` x `hash_size` bits; 8 gives a 64-bit signature
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        let signature = self.hasher.hash_image(image);
        ImageHashValue::from_bytes(signature.as_bytes(), HashAlgorithmKind::Perceptual)
    }
}
