//! JPEG/PNG decoding with EXIF orientation handling and header metadata.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageDecoder, ImageReader};

use super::validate::sniff_format;
use super::{DecodeError, DecodedImage, ImageMetadata, Orientation, SourceFormat};

/// Decode a JPEG or PNG image from bytes.
///
/// JPEG inputs get their EXIF orientation applied. Images with an alpha
/// channel decode to RGBA, everything else to RGB.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the bytes are neither JPEG nor PNG.
/// Returns `DecodeError::CorruptedFile` if the payload cannot be decoded.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    let format = sniff_format(bytes).ok_or(DecodeError::InvalidFormat)?;

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = match format {
        SourceFormat::Jpeg => apply_orientation(img, extract_orientation(bytes)),
        SourceFormat::Png => img,
    };

    if img.width() == 0 || img.height() == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: img.width(),
            height: img.height(),
        });
    }

    if img.color().has_alpha() {
        Ok(DecodedImage::from_rgba_image(img.into_rgba8()))
    } else {
        Ok(DecodedImage::from_rgb_image(img.into_rgb8()))
    }
}

/// Read structural metadata from the container header without decoding pixels.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for unknown headers and
/// `DecodeError::CorruptedFile` when the header cannot be parsed.
pub fn extract_metadata(bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let source_format = sniff_format(bytes).ok_or(DecodeError::InvalidFormat)?;

    let decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?
        .into_decoder()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    let color = decoder.color_type();

    Ok(ImageMetadata {
        width,
        height,
        byte_size: bytes.len() as u64,
        channel_count: color.channel_count(),
        has_alpha: color.has_alpha(),
        source_format,
    })
}

/// Extract EXIF orientation from JPEG bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
