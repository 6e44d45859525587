//! Adaptive search heuristics.
//!
//! Turns an image's header metadata into a starting quality, an iteration
//! budget and a concurrency width for the search. Pure functions only.
//!
//! ## Complexity Score
//!
//! `clamp01(0.4·log10(pixels)/7 + 0.3·(channels + alpha)/4 + 0.3·log10(bytes)/8)`
//!
//! Larger, denser, alpha-bearing images score higher and start the search at
//! a lower quality.

use serde::{Deserialize, Serialize};

use crate::config::HeuristicsConfig;
use crate::decode::ImageMetadata;

const MIB: u64 = 1024 * 1024;

/// Quality the estimate starts from before complexity penalties.
const BASE_QUALITY: f64 = 85.0;

/// Largest penalty applied for high bytes-per-pixel inputs.
const MAX_DENSITY_PENALTY: f64 = 10.0;

/// How the wall-clock budget is split between search phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutStrategy {
    /// Binary search may use the whole budget.
    Aggressive,
    /// Part of the budget is held back for progressive scaling.
    Conservative,
}

/// Search parameters derived once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveHeuristics {
    /// Normalized difficulty score in [0, 1].
    pub complexity: f64,
    /// Starting quality, within the configured quality bounds.
    pub estimated_quality: u8,
    /// Cap on binary-search iterations.
    pub max_iterations: u32,
    pub timeout_strategy: TimeoutStrategy,
    /// Concurrent encodes allowed within one probe batch (at least 2).
    pub parallel_test_count: usize,
}

/// Derive search heuristics from image metadata.
pub fn analyze(meta: &ImageMetadata, config: &HeuristicsConfig) -> AdaptiveHeuristics {
    let complexity = complexity_score(meta);

    AdaptiveHeuristics {
        complexity,
        estimated_quality: estimate_quality(meta, complexity, config),
        max_iterations: max_iterations(meta.byte_size, complexity, config),
        timeout_strategy: if meta.byte_size > config.medium_threshold {
            TimeoutStrategy::Conservative
        } else {
            TimeoutStrategy::Aggressive
        },
        parallel_test_count: parallel_test_count(meta.byte_size, config.parallel_max),
    }
}

/// Complexity score in [0, 1].
pub fn complexity_score(meta: &ImageMetadata) -> f64 {
    let pixels = meta.pixel_count().max(1) as f64;
    let bytes = meta.byte_size.max(1) as f64;
    let channels = meta.channel_count as f64 + if meta.has_alpha { 1.0 } else { 0.0 };

    let score = 0.4 * pixels.log10() / 7.0 + 0.3 * channels / 4.0 + 0.3 * bytes.log10() / 8.0;
    score.clamp(0.0, 1.0)
}

/// Starting quality: lower for complex images and for high bytes-per-pixel
/// inputs (noise, fine detail).
fn estimate_quality(meta: &ImageMetadata, complexity: f64, config: &HeuristicsConfig) -> u8 {
    let density = 1000.0 * meta.byte_size as f64 / meta.pixel_count().max(1) as f64;
    let raw = BASE_QUALITY - 20.0 * complexity - density.min(MAX_DENSITY_PENALTY);

    raw.round()
        .clamp(config.quality_min as f64, config.quality_max as f64) as u8
}

fn max_iterations(byte_size: u64, complexity: f64, config: &HeuristicsConfig) -> u32 {
    let base = if byte_size < config.small_threshold {
        config.small_iterations
    } else if byte_size < config.medium_threshold {
        config.medium_iterations
    } else {
        config.large_iterations
    };

    ((base as f64 * (0.8 + 0.4 * complexity)).round() as u32).max(1)
}

/// One extra concurrent probe per MiB of input, between 2 and `max`.
fn parallel_test_count(byte_size: u64, max: usize) -> usize {
    let by_size = usize::try_from(byte_size / MIB).unwrap_or(usize::MAX);
    by_size.clamp(2, max.max(2))
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::decode::SourceFormat;
    use proptest::prelude::*;

    fn metadata_strategy() -> impl Strategy<Value = ImageMetadata> {
        (1u32..=20_000, 1u32..=20_000, 1u64..=200 * MIB, 1u8..=4, any::<bool>()).prop_map(
            |(width, height, byte_size, channel_count, has_alpha)| ImageMetadata {
                width,
                height,
                byte_size,
                channel_count,
                has_alpha,
                source_format: SourceFormat::Png,
            },
        )
    }

    proptest! {
        /// Property: Every derived field stays inside its documented range.
        #[test]
        fn prop_heuristics_within_bounds(meta in metadata_strategy()) {
            let config = HeuristicsConfig::default();
            let h = analyze(&meta, &config);

            prop_assert!((0.0..=1.0).contains(&h.complexity));
            prop_assert!(h.estimated_quality >= config.quality_min);
            prop_assert!(h.estimated_quality <= config.quality_max);
            prop_assert!(h.max_iterations >= 1);
            prop_assert!(h.parallel_test_count >= 2);
            prop_assert!(h.parallel_test_count <= config.parallel_max);
        }

        /// Property: More input bytes never lowers the complexity score.
        #[test]
        fn prop_complexity_monotonic_in_size(meta in metadata_strategy(), extra in 1u64..=MIB) {
            let mut bigger = meta.clone();
            bigger.byte_size += extra;
            prop_assert!(complexity_score(&bigger) >= complexity_score(&meta));
        }
    }
}
