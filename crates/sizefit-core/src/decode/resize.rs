//! Uniform downscaling used by the progressive-scaling search phase.
//!
//! All functions return new `DecodedImage` instances without modifying the input.

use super::{DecodeError, DecodedImage, FilterType};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` for a zero target size and
/// `DecodeError::BufferMismatch` if the source pixel buffer is inconsistent.
pub fn resize(
    image: &DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let source = image.to_dynamic().ok_or(DecodeError::BufferMismatch {
        width: image.width,
        height: image.height,
    })?;

    let resized = source.resize_exact(width, height, filter.to_image_filter());

    if image.has_alpha {
        Ok(DecodedImage::from_rgba_image(resized.into_rgba8()))
    } else {
        Ok(DecodedImage::from_rgb_image(resized.into_rgb8()))
    }
}

/// Scale an image uniformly by `scale` (0 < scale <= 1).
///
/// A scale of 1.0 (or anything that rounds to the source size) returns a clone.
pub fn scale_image(
    image: &DecodedImage,
    scale: f32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    let (width, height) = scaled_dimensions(image.width, image.height, scale);
    resize(image, width, height, filter)
}

/// Dimensions of a `width x height` image after uniform scaling.
///
/// Each edge is rounded to the nearest pixel and never drops below 1.
/// Scales outside (0, 1] are clamped into that range.
pub fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = if scale.is_finite() {
        scale.clamp(f32::MIN_POSITIVE, 1.0) as f64
    } else {
        1.0
    };
    let w = (width as f64 * scale).round() as u32;
    let h = (height as f64 * scale).round() as u32;
    (w.max(1), h.max(1))
}
