//! Output side of the compression pipeline.
//!
//! This module provides functionality for:
//! - Encoding to JPEG and AVIF at a given quality
//! - The [`Codec`] trait the search engine drives, and its `image`-crate
//!   implementation [`ImageCodec`]
//!
//! Encoding is CPU-bound and synchronous; the engine moves each call onto
//! tokio's blocking pool.
//!
//! # Examples
//!
//! ```ignore
//! use sizefit_core::encode::{Codec, ImageCodec, OutputFormat};
//!
//! let codec = ImageCodec::new();
//! let image = codec.decode(&std::fs::read("photo.png").unwrap()).unwrap();
//! let avif = codec.encode(&image, 60, OutputFormat::Avif, 0.8).unwrap();
//! println!("Encoded {} bytes", avif.len());
//! ```

mod avif;
mod codec;
mod jpeg;
mod types;

pub use avif::{encode_avif, AVIF_SPEED};
pub use codec::{Codec, ImageCodec};
pub use jpeg::{encode_jpeg, encode_jpeg_image};
pub use types::{EncodeError, OutputFormat};
