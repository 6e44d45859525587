//! Core types for input validation and decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The header decoded but reported a zero-sized image.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer could not be rebuilt after a resize.
    #[error("Failed to build pixel buffer for {width}x{height} image")]
    BufferMismatch { width: u32, height: u32 },
}

/// Errors raised while validating raw input, before any decoding work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Input buffer is empty.
    #[error("Input image is empty")]
    Empty,

    /// Input buffer exceeds the accepted size ceiling.
    #[error("Input image is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// Header magic bytes match neither JPEG nor PNG.
    #[error("Unrecognized image header; expected JPEG or PNG")]
    UnrecognizedHeader,
}

/// Accepted input container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    /// Short lowercase name, as used in logs and cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    #[default]
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Structural metadata of a raw input image.
///
/// Read from the container header only; never requires a full decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Size of the raw input in bytes.
    pub byte_size: u64,
    /// Number of color channels (1-4).
    pub channel_count: u8,
    /// Whether the source carries an alpha channel.
    pub has_alpha: bool,
    /// Container the input arrived in.
    pub source_format: SourceFormat,
}

impl ImageMetadata {
    /// Total pixel count.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A decoded image with 8-bit interleaved pixel data.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Whether `pixels` is RGBA (4 bytes per pixel) rather than RGB.
    pub has_alpha: bool,
    /// Pixel data in row-major order.
    /// Length should be width * height * channels().
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Create a new RGB image with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            has_alpha: false,
            pixels,
        }
    }

    /// Create a DecodedImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            has_alpha: false,
            pixels: img.into_raw(),
        }
    }

    /// Create a DecodedImage from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            has_alpha: true,
            pixels: img.into_raw(),
        }
    }

    /// Convert to a DynamicImage for resizing or encoding.
    pub fn to_dynamic(&self) -> Option<image::DynamicImage> {
        if self.has_alpha {
            image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(image::DynamicImage::ImageRgba8)
        } else {
            image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(image::DynamicImage::ImageRgb8)
        }
    }

    /// Bytes per pixel (3 for RGB, 4 for RGBA).
    pub fn channels(&self) -> usize {
        if self.has_alpha {
            4
        } else {
            3
        }
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_type_conversion() {
        assert!(matches!(
            FilterType::Nearest.to_image_filter(),
            image::imageops::FilterType::Nearest
        ));
        assert!(matches!(
            FilterType::Bilinear.to_image_filter(),
            image::imageops::FilterType::Triangle
        ));
        assert!(matches!(
            FilterType::default().to_image_filter(),
            image::imageops::FilterType::Lanczos3
        ));
    }

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(99), Orientation::Normal); // Invalid defaults to Normal
    }

    #[test]
    fn test_metadata_pixel_count_does_not_overflow() {
        let meta = ImageMetadata {
            width: 70_000,
            height: 70_000,
            byte_size: 1,
            channel_count: 3,
            has_alpha: false,
            source_format: SourceFormat::Png,
        };
        assert_eq!(meta.pixel_count(), 4_900_000_000);
    }

    #[test]
    fn test_decoded_image_rgb() {
        let img = DecodedImage::new(100, 50, vec![0u8; 100 * 50 * 3]);

        assert_eq!(img.channels(), 3);
        assert_eq!(img.pixel_count(), 5000);
        assert!(!img.is_empty());
        assert!(matches!(
            img.to_dynamic(),
            Some(image::DynamicImage::ImageRgb8(_))
        ));
    }

    #[test]
    fn test_decoded_image_rgba() {
        let rgba = image::RgbaImage::from_raw(2, 2, vec![10u8; 16]).unwrap();
        let img = DecodedImage::from_rgba_image(rgba);

        assert_eq!(img.channels(), 4);
        assert!(img.has_alpha);
        assert!(matches!(
            img.to_dynamic(),
            Some(image::DynamicImage::ImageRgba8(_))
        ));
    }

    #[test]
    fn test_decoded_image_empty() {
        let img = DecodedImage::new(0, 0, vec![]);
        assert!(img.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::TooLarge { size: 10, max: 5 };
        assert_eq!(
            err.to_string(),
            "Input image is 10 bytes, larger than the 5 byte limit"
        );

        let err = DecodeError::InvalidFormat;
        assert_eq!(err.to_string(), "Invalid or unsupported image format");
    }
}
