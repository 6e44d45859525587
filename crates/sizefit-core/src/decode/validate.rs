//! Cheap pre-admission checks on raw input bytes.
//!
//! Validation looks only at the buffer length and the leading magic bytes, so
//! it can reject bad uploads before a job takes an admission slot.

use super::{SourceFormat, ValidationError};

/// JPEG SOI marker followed by the first marker prefix.
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// The fixed 8-byte PNG signature.
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Identify the container from its magic bytes.
///
/// Returns `None` when the header matches neither accepted format.
pub fn sniff_format(bytes: &[u8]) -> Option<SourceFormat> {
    if bytes.starts_with(JPEG_MAGIC) {
        Some(SourceFormat::Jpeg)
    } else if bytes.starts_with(PNG_MAGIC) {
        Some(SourceFormat::Png)
    } else {
        None
    }
}

/// Validate raw input bytes.
///
/// # Errors
///
/// - `ValidationError::Empty` for a zero-length buffer
/// - `ValidationError::TooLarge` when `bytes.len() > max_size`
/// - `ValidationError::UnrecognizedHeader` when the magic bytes are neither JPEG nor PNG
pub fn validate(bytes: &[u8], max_size: usize) -> Result<SourceFormat, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }
    if bytes.len() > max_size {
        return Err(ValidationError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    sniff_format(bytes).ok_or(ValidationError::UnrecognizedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_jpeg() {
        assert_eq!(
            sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(SourceFormat::Jpeg)
        );
    }

    #[test]
    fn test_sniff_png() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13]);
        assert_eq!(sniff_format(&bytes), Some(SourceFormat::Png));
    }

    #[test]
    fn test_sniff_truncated_magic() {
        assert_eq!(sniff_format(&[0xFF, 0xD8]), None);
        assert_eq!(sniff_format(&PNG_MAGIC[..4]), None);
    }

    #[test]
    fn test_validate_empty() {
        assert_eq!(validate(&[], 1024), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_too_large() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(
            validate(&bytes, 4),
            Err(ValidationError::TooLarge { size: 6, max: 4 })
        );
    }

    #[test]
    fn test_validate_unknown_header() {
        // GIF89a
        let bytes = [0x47, 0x49, 0x46, 0x38, 0x39, 0x61];
        assert_eq!(
            validate(&bytes, 1024),
            Err(ValidationError::UnrecognizedHeader)
        );
    }

    #[test]
    fn test_validate_size_limit_is_inclusive() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(validate(&bytes, 4), Ok(SourceFormat::Jpeg));
    }
}
