//! Hash algorithm seam and the 64-bit signature it produces.

use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which perceptual signature a value holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithmKind {
    /// Brightness gradient between horizontal neighbours
    Difference,
    /// Low-frequency DCT coefficients against their mean
    Perceptual,
}

impl fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithmKind::Difference => "dHash",
            HashAlgorithmKind::Perceptual => "pHash",
        })
    }
}

/// Turns a decoded image into a signature
pub trait HashAlgorithm: Send + Sync {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError>;
}

/// A 64-bit perceptual signature, most significant bit first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHashValue {
    bits: u64,
    algorithm: HashAlgorithmKind,
}

impl ImageHashValue {
    pub fn from_u64(bits: u64, algorithm: HashAlgorithmKind) -> Self {
        Self { bits, algorithm }
    }

    /// Pack up to eight big-endian bytes; anything longer is rejected
    pub fn from_bytes(bytes: &[u8], algorithm: HashAlgorithmKind) -> Result<Self, HashError> {
        if bytes.is_empty() || bytes.len() > 8 {
            return Err(HashError::ComputationFailed(format!(
                "{} signature has {} bytes, expected 1 to 8",
                algorithm,
                bytes.len()
            )));
        }
        let bits = bytes.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        Ok(Self::from_u64(bits, algorithm))
    }

    /// Hamming distance: number of differing bits
    pub fn distance(&self, other: &Self) -> u32 {
        (self.bits ^ other.bits).count_ones()
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn algorithm(&self) -> HashAlgorithmKind {
        self.algorithm
    }
}
