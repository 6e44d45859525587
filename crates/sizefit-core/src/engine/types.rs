//! Request and result types for compression jobs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encode::OutputFormat;

/// Size-targeting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Hit the target byte count exactly (zero tolerance by default).
    Exact,
    /// Land anywhere inside the tolerance band around the target.
    #[default]
    Balanced,
}

/// Scale factors tried in balanced mode.
const BALANCED_SCALES: &[f32] = &[0.9, 0.8, 0.7, 0.6, 0.5];

/// Exact mode has no tolerance cushion, so it downscales further.
const EXACT_SCALES: &[f32] = &[0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3];

impl CompressionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionMode::Exact => "exact",
            CompressionMode::Balanced => "balanced",
        }
    }

    /// Candidate scale factors for the progressive-scaling phase, largest first.
    pub fn scale_factors(self) -> &'static [f32] {
        match self {
            CompressionMode::Exact => EXACT_SCALES,
            CompressionMode::Balanced => BALANCED_SCALES,
        }
    }

    /// The smallest scale factor this mode will ever try.
    pub fn min_scale(self) -> f32 {
        self.scale_factors()
            .iter()
            .copied()
            .fold(1.0, f32::min)
    }
}

impl std::fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(CompressionMode::Exact),
            "balanced" => Ok(CompressionMode::Balanced),
            other => Err(format!("unknown mode '{other}' (expected exact or balanced)")),
        }
    }
}

/// Search phase a job terminated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Parallel probe around the estimated quality.
    Probe,
    /// Parallel binary search over quality.
    BinarySearch,
    /// Progressive downscaling fallback.
    Scaling,
    /// Best effort: no phase met the tolerance.
    Done,
    /// Served from the result cache without encoding.
    Cached,
}

/// One compression job as presented by the caller.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    /// Raw JPEG or PNG bytes.
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub mode: CompressionMode,
}

impl CompressionRequest {
    pub fn new(bytes: Vec<u8>, format: OutputFormat, mode: CompressionMode) -> Self {
        Self {
            bytes,
            format,
            mode,
        }
    }
}

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Final output of a compression job plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Encoded output.
    #[serde(skip)]
    pub buffer: Vec<u8>,
    pub quality: u8,
    /// Always `buffer.len()`.
    pub byte_size: u64,
    pub target_bytes: u64,
    pub dimensions: Dimensions,
    /// True iff `byte_size == target_bytes`.
    pub exact_match: bool,
    /// Encode attempts dispatched by the job, failed ones included.
    pub iterations_used: u32,
    pub mode: CompressionMode,
    pub format: OutputFormat,
    pub processing_time_ms: u64,
    /// Set when the output was downscaled.
    pub scale_factor: Option<f32>,
    pub cache_hit: bool,
    pub phase: Phase,
}

impl CompressionResult {
    /// Absolute distance between the output size and the target.
    pub fn distance(&self) -> u64 {
        self.byte_size.abs_diff(self.target_bytes)
    }

    /// Whether the output lies inside `tolerance` of the target.
    pub fn within(&self, tolerance: u64) -> bool {
        self.distance() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("exact".parse(), Ok(CompressionMode::Exact));
        assert_eq!("Balanced".parse(), Ok(CompressionMode::Balanced));
        assert!("tight".parse::<CompressionMode>().is_err());
    }

    #[test]
    fn test_scale_factors() {
        assert_eq!(CompressionMode::Balanced.scale_factors().len(), 5);
        assert_eq!(CompressionMode::Exact.scale_factors().len(), 7);
        assert!((CompressionMode::Balanced.min_scale() - 0.5).abs() < f32::EPSILON);
        assert!((CompressionMode::Exact.min_scale() - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_result_serializes_without_buffer() {
        let result = CompressionResult {
            buffer: vec![1, 2, 3],
            quality: 80,
            byte_size: 3,
            target_bytes: 3,
            dimensions: Dimensions {
                width: 1,
                height: 1,
            },
            exact_match: true,
            iterations_used: 4,
            mode: CompressionMode::Exact,
            format: OutputFormat::Jpeg,
            processing_time_ms: 12,
            scale_factor: None,
            cache_hit: false,
            phase: Phase::BinarySearch,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("buffer").is_none());
        assert_eq!(json["phase"], "binary_search");
        assert_eq!(json["mode"], "exact");
        assert!(result.within(0));
    }
}
