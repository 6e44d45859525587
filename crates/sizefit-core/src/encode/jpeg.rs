//! Baseline JPEG output.
//!
//! JPEG has no alpha channel, so RGBA sources are flattened to RGB before
//! encoding. The `image` crate's encoder writes no timestamps, which keeps
//! identical inputs byte-identical across runs.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{EncodeError, OutputFormat};
use crate::decode::DecodedImage;

/// Encode RGB pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - RGB pixel data (3 bytes per pixel, row-major order)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality, clamped to 1-100
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed {
            format: OutputFormat::Jpeg,
            message: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}

/// Encode a decoded image to JPEG, dropping alpha if present.
pub fn encode_jpeg_image(image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if !image.has_alpha {
        return encode_jpeg(&image.pixels, image.width, image.height, quality);
    }

    let rgb: Vec<u8> = image
        .pixels
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    encode_jpeg(&rgb, image.width, image.height, quality)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
