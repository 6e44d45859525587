//! Sizefit Core - Adaptive size-targeting image compression
//!
//! This crate compresses a JPEG or PNG upload to JPEG or AVIF so that the
//! output lands as close as possible to a configured byte target, searching
//! over encoder quality and, when quality alone cannot get there, uniform
//! downscaling.
//!
//! The main entry point is [`CompressionEngine`]. It is built from an
//! [`EngineConfig`] and drives an encoder through the [`Codec`] trait.
//!
//! ```ignore
//! use sizefit_core::{CompressionEngine, CompressionMode, CompressionRequest, EngineConfig, OutputFormat};
//!
//! let engine = CompressionEngine::new(EngineConfig::default())?;
//! let bytes = std::fs::read("photo.jpg")?;
//! let result = engine
//!     .compress(CompressionRequest::new(bytes, OutputFormat::Jpeg, CompressionMode::Balanced))
//!     .await?;
//! println!("{} bytes at quality {}", result.byte_size, result.quality);
//! ```

pub mod cache;
pub mod config;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod resources;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStats, CachedOutput, Clock, ManualClock, ResultCache, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use decode::{DecodeError, ImageMetadata, SourceFormat, ValidationError};
pub use encode::{Codec, EncodeError, ImageCodec, OutputFormat};
pub use engine::{
    CompressionEngine, CompressionMode, CompressionRequest, CompressionResult, Dimensions, Phase,
};
pub use error::EngineError;
pub use heuristics::{analyze, AdaptiveHeuristics, TimeoutStrategy};
pub use resources::{JobPermit, ResourceManager};
