//! Compression engine.
//!
//! [`CompressionEngine::compress`] takes raw image bytes to an output that is
//! as close to the configured byte target as the search can get:
//!
//! 1. Validate the input and claim a job slot.
//! 2. Serve from the result cache when possible.
//! 3. Read metadata, derive heuristics and decode once.
//! 4. Run the phased search (see [`search`]).
//! 5. Cache and return the chosen output.

mod job;
mod search;
mod trial;
mod types;

pub use types::{CompressionMode, CompressionRequest, CompressionResult, Dimensions, Phase};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::cache::{CachedOutput, ResultCache};
use crate::config::{ConfigError, EngineConfig};
use crate::decode::{scaled_dimensions, DecodeError};
use crate::encode::{Codec, ImageCodec, OutputFormat};
use crate::error::EngineError;
use crate::heuristics::{analyze, TimeoutStrategy};
use crate::resources::ResourceManager;
use job::{Job, JobSpec};

/// Size-targeting compression service.
///
/// Cheap to share behind an `Arc`; every job borrows the engine immutably and
/// the cache and admission counter synchronize internally.
pub struct CompressionEngine {
    config: EngineConfig,
    codec: Arc<dyn Codec>,
    cache: Arc<ResultCache>,
    resources: Arc<ResourceManager>,
    jobs_started: AtomicU64,
}

impl CompressionEngine {
    /// Engine backed by the `image` crate codecs.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_codec(config, Arc::new(ImageCodec::new()))
    }

    /// Engine with a caller-supplied codec.
    pub fn with_codec(config: EngineConfig, codec: Arc<dyn Codec>) -> Result<Self, ConfigError> {
        let cache = Arc::new(ResultCache::new(config.cache_ttl()));
        let resources = Arc::new(ResourceManager::new(config.limits.max_concurrent_jobs));
        Self::with_parts(config, codec, cache, resources)
    }

    /// Engine sharing an existing cache and admission counter.
    pub fn with_parts(
        config: EngineConfig,
        codec: Arc<dyn Codec>,
        cache: Arc<ResultCache>,
        resources: Arc<ResourceManager>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            codec,
            cache,
            resources,
            jobs_started: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Compress one image toward the configured byte target.
    ///
    /// Missing the target is not an error: the closest output found comes
    /// back with `exact_match == false`.
    #[instrument(
        skip_all,
        fields(format = %request.format, mode = %request.mode, input_bytes = request.bytes.len())
    )]
    pub async fn compress(
        &self,
        request: CompressionRequest,
    ) -> Result<CompressionResult, EngineError> {
        let started = Instant::now();
        let CompressionRequest {
            bytes,
            format,
            mode,
        } = request;

        self.codec
            .validate(&bytes, self.config.limits.max_input_bytes)?;
        let _permit = self.resources.try_admit()?;
        self.maybe_cleanup();

        let target = self.config.target.target_bytes;
        let tolerance = self.config.tolerance(mode);
        let key = ResultCache::generate_key(&bytes, format, mode, target, tolerance);
        if let Some(hit) = self.cache.get(&key) {
            debug!(size = hit.buffer.len(), "cache hit");
            return Ok(cached_result(&hit, target, format, mode, started));
        }

        let meta = self.codec.extract_metadata(&bytes)?;
        let heuristics = analyze(&meta, &self.config.heuristics);
        debug!(
            width = meta.width,
            height = meta.height,
            complexity = heuristics.complexity,
            estimated_quality = heuristics.estimated_quality,
            max_iterations = heuristics.max_iterations,
            strategy = ?heuristics.timeout_strategy,
            "heuristics derived"
        );

        let codec = Arc::clone(&self.codec);
        let image = tokio::task::spawn_blocking(move || codec.decode(&bytes))
            .await
            .map_err(|e| DecodeError::CorruptedFile(format!("decoder aborted: {e}")))??;
        let image = Arc::new(image);

        let scaling_reserve = match heuristics.timeout_strategy {
            TimeoutStrategy::Conservative => self.config.heuristics.scaling_reserve,
            TimeoutStrategy::Aggressive => 0.0,
        };
        let mut job = Job::new(
            Arc::clone(&self.codec),
            Arc::clone(&image),
            JobSpec {
                format,
                target,
                tolerance,
                budget: self.config.timeout(mode),
                scaling_reserve,
                memory_limit: self.config.limits.max_job_memory_bytes,
                parallelism: heuristics.parallel_test_count,
            },
        );

        let (trial, phase) = search::run(&mut job, &heuristics, mode).await?;

        let (width, height) = scaled_dimensions(image.width, image.height, trial.scale);
        let scale_factor = trial.is_scaled().then_some(trial.scale);
        let buffer = Arc::unwrap_or_clone(trial.buffer);
        let byte_size = buffer.len() as u64;

        self.cache.set(
            key,
            CachedOutput {
                buffer: buffer.clone(),
                quality: trial.quality,
                scale_factor,
                width,
                height,
            },
        );

        let result = CompressionResult {
            buffer,
            quality: trial.quality,
            byte_size,
            target_bytes: target,
            dimensions: Dimensions { width, height },
            exact_match: byte_size == target,
            iterations_used: job.attempts(),
            mode,
            format,
            processing_time_ms: started.elapsed().as_millis() as u64,
            scale_factor,
            cache_hit: false,
            phase,
        };

        info!(
            size = result.byte_size,
            target,
            distance = result.distance(),
            quality = result.quality,
            scale = ?result.scale_factor,
            iterations = result.iterations_used,
            phase = ?result.phase,
            elapsed_ms = result.processing_time_ms,
            "compression finished"
        );
        Ok(result)
    }

    /// Sweep expired cache entries every `cleanup_every_jobs` admitted jobs.
    fn maybe_cleanup(&self) {
        let every = self.config.cache.cleanup_every_jobs;
        let started = self.jobs_started.fetch_add(1, Ordering::Relaxed) + 1;
        if every > 0 && started % every == 0 {
            let removed = self.cache.cleanup();
            debug!(removed, "periodic cache cleanup");
        }
    }
}

impl std::fmt::Debug for CompressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

fn cached_result(
    hit: &CachedOutput,
    target: u64,
    format: OutputFormat,
    mode: CompressionMode,
    started: Instant,
) -> CompressionResult {
    let byte_size = hit.buffer.len() as u64;
    CompressionResult {
        buffer: hit.buffer.clone(),
        quality: hit.quality,
        byte_size,
        target_bytes: target,
        dimensions: Dimensions {
            width: hit.width,
            height: hit.height,
        },
        exact_match: byte_size == target,
        iterations_used: 0,
        mode,
        format,
        processing_time_ms: started.elapsed().as_millis() as u64,
        scale_factor: hit.scale_factor,
        cache_hit: true,
        phase: Phase::Cached,
    }
}
