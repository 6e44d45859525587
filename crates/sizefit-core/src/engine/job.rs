//! Per-job search state and parallel trial batches.
//!
//! A [`Job`] owns everything one compression run accumulates: the decoded
//! image, the running best trial, the attempt counter, the memory tally and
//! the deadlines. Phases drive it by handing batches of candidates to
//! [`Job::run_batch`], which encodes them concurrently on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::trial::{BestTrial, Candidate, QualityTrial};
use crate::decode::DecodedImage;
use crate::encode::{Codec, EncodeError, OutputFormat};
use crate::error::EngineError;

/// Why a single trial produced no output. Logged, never returned.
#[derive(Debug, Error)]
enum TrialError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("encode task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("no resampled source at scale {0}")]
    NoSource(f32),
}

/// Fixed inputs a job is created from.
pub(crate) struct JobSpec {
    pub format: OutputFormat,
    pub target: u64,
    pub tolerance: u64,
    /// Wall-clock budget for the whole search.
    pub budget: Duration,
    /// Share of `budget` that binary search must leave unused.
    pub scaling_reserve: f64,
    pub memory_limit: u64,
    /// Concurrent encodes per batch.
    pub parallelism: usize,
}

pub(crate) struct Job {
    codec: Arc<dyn Codec>,
    image: Arc<DecodedImage>,
    /// Resampled sources keyed by `f32::to_bits` of the scale.
    scaled: HashMap<u32, Arc<DecodedImage>>,
    spec: JobSpec,
    permits: Arc<Semaphore>,
    deadline: Instant,
    search_deadline: Instant,
    best: BestTrial,
    attempts: u32,
    memory_used: u64,
}

impl Job {
    pub fn new(codec: Arc<dyn Codec>, image: Arc<DecodedImage>, spec: JobSpec) -> Self {
        let started = Instant::now();
        let search_budget = spec.budget.mul_f64(1.0 - spec.scaling_reserve.clamp(0.0, 1.0));

        Self {
            permits: Arc::new(Semaphore::new(spec.parallelism.max(1))),
            deadline: started + spec.budget,
            search_deadline: started + search_budget,
            best: BestTrial::new(spec.target),
            attempts: 0,
            memory_used: 0,
            scaled: HashMap::new(),
            codec,
            image,
            spec,
        }
    }

    pub fn target(&self) -> u64 {
        self.spec.target
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn best(&self) -> Option<&QualityTrial> {
        self.best.get()
    }

    /// Whether `trial` is inside the tolerance band.
    pub fn satisfies(&self, trial: &QualityTrial) -> bool {
        trial.distance(self.spec.target) <= self.spec.tolerance
    }

    /// The whole wall-clock budget is spent.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Binary search must stop; what is left belongs to scaling.
    pub fn search_expired(&self) -> bool {
        Instant::now() >= self.search_deadline
    }

    /// Resample the image for every scale in `candidates` not seen yet.
    ///
    /// Failures are logged; trials at that scale then fail on their own.
    async fn prepare_scales(&mut self, candidates: &[Candidate]) {
        let mut pending: Vec<f32> = Vec::new();
        for candidate in candidates {
            let scale = candidate.scale;
            if scale < 1.0
                && !self.scaled.contains_key(&scale.to_bits())
                && !pending.iter().any(|p| p.to_bits() == scale.to_bits())
            {
                pending.push(scale);
            }
        }
        if pending.is_empty() {
            return;
        }

        let tasks = pending.into_iter().map(|scale| {
            let codec = Arc::clone(&self.codec);
            let image = Arc::clone(&self.image);
            let permits = Arc::clone(&self.permits);

            async move {
                // The semaphore is never closed; without a permit the work
                // simply runs unbounded.
                let _permit = permits.acquire_owned().await.ok();
                let resampled =
                    tokio::task::spawn_blocking(move || codec.resample(&image, scale)).await;
                (scale, resampled)
            }
        });

        for (scale, resampled) in join_all(tasks).await {
            match resampled {
                Ok(Ok(image)) => {
                    debug!(scale, width = image.width, height = image.height, "resampled");
                    self.scaled.insert(scale.to_bits(), Arc::new(image));
                }
                Ok(Err(e)) => warn!(scale, error = %e, "resampling failed"),
                Err(e) => warn!(scale, error = %e, "resampling task aborted"),
            }
        }
    }

    fn source(&self, scale: f32) -> Option<Arc<DecodedImage>> {
        if scale >= 1.0 {
            Some(Arc::clone(&self.image))
        } else {
            self.scaled.get(&scale.to_bits()).cloned()
        }
    }

    /// Encode every candidate concurrently and return the ones that succeeded.
    ///
    /// Failed trials are logged and dropped. Every successful trial is offered
    /// to the running best. Exceeding the memory ceiling aborts the job.
    pub async fn run_batch(
        &mut self,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<QualityTrial>, EngineError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.attempts = self
            .attempts
            .saturating_add(u32::try_from(candidates.len()).unwrap_or(u32::MAX));
        self.prepare_scales(&candidates).await;

        let tasks = candidates.into_iter().map(|candidate| {
            let codec = Arc::clone(&self.codec);
            let source = self.source(candidate.scale);
            let permits = Arc::clone(&self.permits);
            let format = self.spec.format;

            async move {
                let Some(source) = source else {
                    return (candidate, Err(TrialError::NoSource(candidate.scale)));
                };
                let _permit = permits.acquire_owned().await.ok();
                let encoded = tokio::task::spawn_blocking(move || {
                    codec.encode(&source, candidate.quality, format, 1.0)
                })
                .await;

                let result = match encoded {
                    Ok(Ok(buffer)) => Ok(buffer),
                    Ok(Err(e)) => Err(TrialError::from(e)),
                    Err(e) => Err(TrialError::from(e)),
                };
                (candidate, result)
            }
        });

        let outcomes = join_all(tasks).await;

        let mut trials = Vec::new();
        for (candidate, result) in outcomes {
            match result {
                Ok(buffer) => {
                    let trial = QualityTrial::new(candidate, buffer);
                    debug!(
                        quality = trial.quality,
                        scale = trial.scale,
                        size = trial.byte_size(),
                        "trial encoded"
                    );
                    self.memory_used = self.memory_used.saturating_add(trial.byte_size());
                    self.best.offer(&trial);
                    trials.push(trial);
                }
                Err(e) => {
                    warn!(
                        quality = candidate.quality,
                        scale = candidate.scale,
                        error = %e,
                        "trial failed"
                    );
                }
            }
        }

        if self.memory_used > self.spec.memory_limit {
            return Err(EngineError::ResourceLimit {
                used: self.memory_used,
                limit: self.spec.memory_limit,
            });
        }

        Ok(trials)
    }
}
