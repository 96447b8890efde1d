//! Fast image decoding with format-specific optimizations.
//!
//! Uses zune-jpeg for JPEG bytes (1.5-2x faster than image crate),
//! falls back to image crate for other formats.

use crate::error::HashError;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Fast image decoder that picks a decoder from the content itself
pub struct FastDecoder;

impl FastDecoder {
    /// Decode downloaded photo bytes using the fastest available decoder.
    ///
    /// Format is sniffed from the magic bytes, not from the photo's
    /// declared mime type.
    pub fn decode(bytes: &[u8], photo_id: &str) -> Result<DynamicImage, HashError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => {
                Self::decode_jpeg(bytes, photo_id).or_else(|_| Self::decode_fallback(bytes, photo_id))
            }
            _ => Self::decode_fallback(bytes, photo_id),
        }
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8], photo_id: &str) -> Result<DynamicImage, HashError> {
        let decode_error = |reason: String| HashError::Decode {
            photo_id: photo_id.to_string(),
            reason,
        };

        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder
            .decode()
            .map_err(|e| decode_error(format!("zune-jpeg decode failed: {:?}", e)))?;

        let info = decoder
            .info()
            .ok_or_else(|| decode_error("missing image info".to_string()))?;

        let width = info.width as u32;
        let height = info.height as u32;

        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        let image = match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("RGB buffer size mismatch".to_string()))?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("RGBA buffer size mismatch".to_string()))?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("Luma buffer size mismatch".to_string()))?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes, photo_id),
        };

        Ok(image)
    }

    fn decode_fallback(bytes: &[u8], photo_id: &str) -> Result<DynamicImage, HashError> {
        image::load_from_memory(bytes).map_err(|e| HashError::Decode {
            photo_id: photo_id.to_string(),
            reason: e.to_string(),
        })
    }
}
