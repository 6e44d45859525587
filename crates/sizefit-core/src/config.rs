//! Engine configuration.
//!
//! Every section has defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! [target]
//! target_bytes = 80000
//! tolerance_balanced = 10000
//!
//! [limits]
//! timeout_exact_ms = 25000
//! max_concurrent_jobs = 4
//!
//! [heuristics]
//! quality_min = 10
//! quality_max = 95
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::CompressionMode;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub target: TargetConfig,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
    pub heuristics: HeuristicsConfig,
}

/// Byte budget and the tolerance band for each mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Desired output size in bytes.
    pub target_bytes: u64,
    /// Accepted |size - target| in exact mode.
    pub tolerance_exact: u64,
    /// Accepted |size - target| in balanced mode.
    pub tolerance_balanced: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            target_bytes: 80_000,
            tolerance_exact: 0,
            tolerance_balanced: 10_000,
        }
    }
}

/// Wall-clock, memory and admission limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub timeout_exact_ms: u64,
    pub timeout_balanced_ms: u64,
    /// Ceiling on the summed size of all encoded buffers one job produces.
    pub max_job_memory_bytes: u64,
    pub max_concurrent_jobs: usize,
    /// Largest raw input accepted by validation.
    pub max_input_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_exact_ms: 25_000,
            timeout_balanced_ms: 10_000,
            max_job_memory_bytes: 512 * MIB,
            max_concurrent_jobs: 4,
            max_input_bytes: 50 * MIB as usize,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Run a full expiry sweep once every this many jobs. 0 disables sweeps.
    pub cleanup_every_jobs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            cleanup_every_jobs: 10,
        }
    }
}

/// Tuning knobs for the heuristics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub quality_min: u8,
    pub quality_max: u8,
    /// Inputs below this many bytes use the small iteration budget.
    pub small_threshold: u64,
    /// Inputs below this many bytes (and not small) use the medium budget.
    pub medium_threshold: u64,
    pub small_iterations: u32,
    pub medium_iterations: u32,
    pub large_iterations: u32,
    /// Upper bound on concurrent encodes within one probe batch.
    pub parallel_max: usize,
    /// Share of the wall-clock budget the conservative strategy keeps for scaling.
    pub scaling_reserve: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            quality_min: 10,
            quality_max: 95,
            small_threshold: 500 * KIB,
            medium_threshold: 2 * MIB,
            small_iterations: 8,
            medium_iterations: 12,
            large_iterations: 16,
            parallel_max: 4,
            scaling_reserve: 0.25,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.heuristics;
        if h.quality_min == 0 || h.quality_max > 100 || h.quality_min > h.quality_max {
            return Err(ConfigError::Invalid(format!(
                "quality bounds must satisfy 1 <= min <= max <= 100, got {}..={}",
                h.quality_min, h.quality_max
            )));
        }
        if h.small_threshold >= h.medium_threshold {
            return Err(ConfigError::Invalid(format!(
                "small_threshold ({}) must be below medium_threshold ({})",
                h.small_threshold, h.medium_threshold
            )));
        }
        if h.small_iterations == 0 || h.medium_iterations == 0 || h.large_iterations == 0 {
            return Err(ConfigError::Invalid(
                "iteration budgets must be positive".to_string(),
            ));
        }
        if h.parallel_max < 2 {
            return Err(ConfigError::Invalid(format!(
                "parallel_max must be at least 2, got {}",
                h.parallel_max
            )));
        }
        if !(0.0..1.0).contains(&h.scaling_reserve) {
            return Err(ConfigError::Invalid(format!(
                "scaling_reserve must be in [0, 1), got {}",
                h.scaling_reserve
            )));
        }
        if self.limits.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_jobs must be positive".to_string(),
            ));
        }
        if self.target.target_bytes == 0 {
            return Err(ConfigError::Invalid(
                "target_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Accepted distance from the target for `mode`.
    pub fn tolerance(&self, mode: CompressionMode) -> u64 {
        match mode {
            CompressionMode::Exact => self.target.tolerance_exact,
            CompressionMode::Balanced => self.target.tolerance_balanced,
        }
    }

    /// Wall-clock budget for one job in `mode`.
    pub fn timeout(&self, mode: CompressionMode) -> Duration {
        Duration::from_millis(match mode {
            CompressionMode::Exact => self.limits.timeout_exact_ms,
            CompressionMode::Balanced => self.limits.timeout_balanced_ms,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [target]
            target_bytes = 1000

            [limits]
            max_concurrent_jobs = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.target.target_bytes, 1000);
        assert_eq!(config.target.tolerance_balanced, 10_000);
        assert_eq!(config.limits.max_concurrent_jobs, 8);
        assert_eq!(config.limits.timeout_exact_ms, 25_000);
    }

    #[test]
    fn test_mode_lookups() {
        let config = EngineConfig::default();

        assert_eq!(config.tolerance(CompressionMode::Exact), 0);
        assert_eq!(config.tolerance(CompressionMode::Balanced), 10_000);
        assert!(config.timeout(CompressionMode::Exact) > config.timeout(CompressionMode::Balanced));
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_invalid_quality_bounds() {
        let result = EngineConfig::from_toml_str(
            r#"
            [heuristics]
            quality_min = 90
            quality_max = 40
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = EngineConfig::default();
        config.heuristics.small_threshold = config.heuristics.medium_threshold;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_reserve() {
        let mut config = EngineConfig::default();
        config.heuristics.scaling_reserve = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let mut config = EngineConfig::default();
        config.limits.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let result = EngineConfig::from_toml_str("[target\ntarget_bytes = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/definitely/not/here/sizefit.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
