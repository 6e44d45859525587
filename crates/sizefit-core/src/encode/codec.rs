//! The codec seam between the search engine and actual image encoding.
//!
//! The engine only ever talks to [`Codec`]; it never looks inside the
//! encoders. [`ImageCodec`] is the production implementation.

use super::{encode_avif, encode_jpeg_image, EncodeError, OutputFormat};
use crate::decode::{
    self, scale_image, DecodeError, DecodedImage, FilterType, ImageMetadata, SourceFormat,
    ValidationError,
};

/// Black-box encoder used by the compression engine.
///
/// Implementations must be deterministic: the same image, quality, format and
/// scale always produce the same bytes.
pub trait Codec: Send + Sync {
    /// Decode raw input bytes into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;

    /// Encode `image` at `quality` (1-100) after uniform scaling by `scale` (0, 1].
    ///
    /// The engine resamples once per scale through [`Codec::resample`] and
    /// encodes the result at scale 1.0, so a scale below 1.0 here only comes
    /// from direct callers.
    fn encode(
        &self,
        image: &DecodedImage,
        quality: u8,
        format: OutputFormat,
        scale: f32,
    ) -> Result<Vec<u8>, EncodeError>;

    /// Read structural metadata from raw input bytes.
    fn extract_metadata(&self, bytes: &[u8]) -> Result<ImageMetadata, DecodeError>;

    /// Uniformly downscale `image` by `scale` (0, 1].
    fn resample(&self, image: &DecodedImage, scale: f32) -> Result<DecodedImage, EncodeError> {
        resample_with(image, scale, FilterType::default())
    }

    /// Check that raw input is non-empty, within `max_size`, and JPEG or PNG.
    fn validate(&self, bytes: &[u8], max_size: usize) -> Result<SourceFormat, ValidationError> {
        decode::validate(bytes, max_size)
    }
}

fn resample_with(
    image: &DecodedImage,
    scale: f32,
    filter: FilterType,
) -> Result<DecodedImage, EncodeError> {
    if !(scale > 0.0 && scale <= 1.0) {
        return Err(EncodeError::InvalidScale(scale));
    }
    scale_image(image, scale, filter).map_err(|e| EncodeError::ScalingFailed(e.to_string()))
}

/// [`Codec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec {
    /// Resampling filter for scaled trials.
    pub filter: FilterType,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        decode::decode_image(bytes)
    }

    fn encode(
        &self,
        image: &DecodedImage,
        quality: u8,
        format: OutputFormat,
        scale: f32,
    ) -> Result<Vec<u8>, EncodeError> {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(EncodeError::InvalidScale(scale));
        }

        let scaled;
        let source = if scale < 1.0 {
            scaled = self.resample(image, scale)?;
            &scaled
        } else {
            image
        };

        match format {
            OutputFormat::Jpeg => encode_jpeg_image(source, quality),
            OutputFormat::Avif => encode_avif(source, quality),
        }
    }

    fn extract_metadata(&self, bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
        decode::extract_metadata(bytes)
    }

    fn resample(&self, image: &DecodedImage, scale: f32) -> Result<DecodedImage, EncodeError> {
        resample_with(image, scale, self.filter)
    }
}
