//! Test fixtures: synthetic images and a scriptable codec.

use std::io::Cursor;
use std::sync::Mutex;

use image::{ImageFormat, RgbImage, RgbaImage};

use crate::decode::{scaled_dimensions, DecodeError, DecodedImage, ImageMetadata, SourceFormat};
use crate::encode::{Codec, EncodeError, OutputFormat};

/// Smallest byte string that passes input validation as a JPEG.
pub(crate) const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// A `width x height` RGB gradient encoded as JPEG.
pub(crate) fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    gradient_rgb(width, height)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

/// A `width x height` RGB gradient encoded as PNG.
pub(crate) fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    gradient_rgb(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A `width x height` RGBA gradient with varying alpha, encoded as PNG.
pub(crate) fn gradient_png_rgba(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            ((x + y) * 16 % 256) as u8,
        ])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

type SizeFn = dyn Fn(u8, f32) -> Option<usize> + Send + Sync;

/// Codec whose output size is a function of `(quality, scale)`.
///
/// `None` from the size function makes that encode fail. Decoding returns a
/// black image with the configured metadata's dimensions. The scale handed to
/// the size function is the effective one: the encode's own scale times the
/// ratio of the image it was given to the decoded width, so resampled
/// sources and direct scaled encodes look the same.
pub(crate) struct MockCodec {
    size: Box<SizeFn>,
    metadata: ImageMetadata,
    decodable: bool,
    encodes: Mutex<Vec<(u8, f32)>>,
    resamples: Mutex<Vec<f32>>,
}

impl MockCodec {
    pub fn new(size: impl Fn(u8, f32) -> Option<usize> + Send + Sync + 'static) -> Self {
        Self {
            size: Box::new(size),
            metadata: ImageMetadata {
                width: 50,
                height: 50,
                byte_size: 2_000,
                channel_count: 3,
                has_alpha: false,
                source_format: SourceFormat::Jpeg,
            },
            decodable: true,
            encodes: Mutex::new(Vec::new()),
            resamples: Mutex::new(Vec::new()),
        }
    }

    /// Every encode fails.
    pub fn failing() -> Self {
        Self::new(|_, _| None)
    }

    /// Metadata reads fine but decoding fails.
    pub fn undecodable() -> Self {
        Self {
            decodable: false,
            ..Self::new(|q, _| Some(q as usize))
        }
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn encode_calls(&self) -> usize {
        self.encodes.lock().unwrap().len()
    }

    /// Every `(quality, effective scale)` encoded so far, sorted.
    pub fn encoded(&self) -> Vec<(u8, f32)> {
        let mut calls = self.encodes.lock().unwrap().clone();
        calls.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        calls
    }

    /// Scales passed to `resample`, in call order.
    pub fn resampled(&self) -> Vec<f32> {
        self.resamples.lock().unwrap().clone()
    }
}

impl Codec for MockCodec {
    fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        if !self.decodable {
            return Err(DecodeError::CorruptedFile("truncated scan".to_string()));
        }
        let (width, height) = (self.metadata.width, self.metadata.height);
        Ok(DecodedImage::new(
            width,
            height,
            vec![0; width as usize * height as usize * 3],
        ))
    }

    fn encode(
        &self,
        image: &DecodedImage,
        quality: u8,
        format: OutputFormat,
        scale: f32,
    ) -> Result<Vec<u8>, EncodeError> {
        let scale = image.width as f32 / self.metadata.width as f32 * scale;
        self.encodes.lock().unwrap().push((quality, scale));
        match (self.size)(quality, scale) {
            Some(size) => Ok(vec![quality; size]),
            None => Err(EncodeError::EncodingFailed {
                format,
                message: format!("scripted failure at quality {quality}"),
            }),
        }
    }

    fn extract_metadata(&self, _bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
        Ok(self.metadata.clone())
    }

    fn resample(&self, image: &DecodedImage, scale: f32) -> Result<DecodedImage, EncodeError> {
        self.resamples.lock().unwrap().push(scale);
        let (width, height) = scaled_dimensions(image.width, image.height, scale);
        Ok(DecodedImage::new(
            width,
            height,
            vec![0; width as usize * height as usize * 3],
        ))
    }
}
