//! Lossy AVIF output through the `image` crate's ravif-backed encoder.

use image::codecs::avif::AvifEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{EncodeError, OutputFormat};
use crate::decode::DecodedImage;

/// Encoder speed (1 = slowest/best, 10 = fastest).
///
/// Fixed so identical inputs always produce identical bytes.
pub const AVIF_SPEED: u8 = 8;

/// Encode a decoded image to AVIF, keeping alpha when the source has it.
pub fn encode_avif(image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let expected = image.width as usize * image.height as usize * image.channels();
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    let color = if image.has_alpha {
        ExtendedColorType::Rgba8
    } else {
        ExtendedColorType::Rgb8
    };

    let mut buffer = Vec::new();
    AvifEncoder::new_with_speed_quality(&mut buffer, AVIF_SPEED, quality.clamp(1, 100))
        .write_image(&image.pixels, image.width, image.height, color)
        .map_err(|e| EncodeError::EncodingFailed {
            format: OutputFormat::Avif,
            message: e.to_string(),
        })?;

    Ok(buffer)
}
