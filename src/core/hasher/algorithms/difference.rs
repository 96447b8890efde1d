//! dHash: one bit per horizontal brightness step.
//!
//! The image is reduced to a `(size + 1) x size` luma grid. Each bit is set
//! when a cell is brighter than its right-hand neighbour, so an 8-row grid
//! gives a 64-bit signature read row by row, most significant bit first.

use super::super::fast_resize::grayscale_grid;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::DynamicImage;

pub struct DifferenceHasher {
    hash_size: u32,
}

impl DifferenceHasher {
    /// `hash_size * hash_size` must fit in 64 bits
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        let size = self.hash_size;
        if size == 0 || size * size > 64 {
            return Err(HashError::ComputationFailed(format!(
                "dHash size {} does not fit a 64-bit signature",
                size
            )));
        }
        let grid = grayscale_grid(image, size + 1, size)?;

        let bits = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .fold(0u64, |acc, (x, y)| {
                let brighter = grid.get_pixel(x, y)[0] > grid.get_pixel(x + 1, y)[0];
                (acc << 1) | u64::from(brighter)
            });

        Ok(ImageHashValue::from_u64(bits, HashAlgorithmKind::Difference))
    }
}
