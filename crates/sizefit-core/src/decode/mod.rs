//! Input side of the compression pipeline.
//!
//! This module provides functionality for:
//! - Validating raw uploads by size and header magic (JPEG, PNG)
//! - Reading structural metadata from the container header
//! - Decoding to 8-bit RGB/RGBA with EXIF orientation applied
//! - Uniform downscaling for the progressive-scaling search
//!
//! # Examples
//!
//! ```ignore
//! use sizefit_core::decode::{decode_image, extract_metadata, validate};
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! validate(&bytes, 50 * 1024 * 1024).unwrap();
//! let meta = extract_metadata(&bytes).unwrap();
//! let image = decode_image(&bytes).unwrap();
//! println!("Decoded {}x{} ({} bytes)", image.width, image.height, meta.byte_size);
//! ```

mod reader;
mod resize;
mod types;
mod validate;

pub use reader::{decode_image, extract_metadata};
pub use resize::{resize, scale_image, scaled_dimensions};
pub use types::{
    DecodeError, DecodedImage, FilterType, ImageMetadata, Orientation, SourceFormat,
    ValidationError,
};
pub use validate::{sniff_format, validate};
