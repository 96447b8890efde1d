//! Grayscale downscaling onto a hash grid with fast_image_resize.

use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage};

/// Downscale `image` to a `width` x `height` luma grid.
///
/// Conversion to luma happens before the resize so the SIMD path only
/// touches one channel.
pub fn grayscale_grid(image: &DynamicImage, width: u32, height: u32) -> Result<GrayImage, HashError> {
    if width == 0 || height == 0 {
        return Err(HashError::ComputationFailed(format!(
            "hash grid must be non-empty, got {}x{}",
            width, height
        )));
    }
    let luma = image.to_luma8();
    let (src_width, src_height) = luma.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(HashError::ComputationFailed("image has no pixels".to_string()));
    }

    let source = Image::from_vec_u8(src_width, src_height, luma.into_raw(), PixelType::U8)
        .map_err(|e| HashError::ComputationFailed(format!("source buffer: {}", e)))?;
    let mut target = Image::new(width, height, PixelType::U8);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    Resizer::new()
        .resize(&source, &mut target, &options)
        .map_err(|e| HashError::ComputationFailed(format!("resize: {}", e)))?;

    GrayImage::from_raw(width, height, target.into_vec())
        .ok_or_else(|| HashError::ComputationFailed("resized grid has the wrong length".to_string()))
}
