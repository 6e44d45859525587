//! The phased quality search.
//!
//! ## Phases
//!
//! 1. **Floor check**: quality 1 at the smallest scale. If even that is
//!    above the band, nothing can fit and the floor trial is returned.
//! 2. **Probe**: four qualities around the heuristic estimate.
//! 3. **Binary search**: three-wide batches around the midpoint of a
//!    shrinking quality window.
//! 4. **Scaling**: fixed qualities at decreasing scale factors.
//!
//! Each phase either satisfies the tolerance or hands over to the next; the
//! probe's closest trial also seeds the binary-search window. When no phase
//! is satisfied, the best trial seen anywhere wins, which the job tracks
//! across phases.

use tracing::{debug, info};

use super::job::Job;
use super::trial::{clamp_qualities, select_best, Candidate, QualityTrial};
use super::types::{CompressionMode, Phase};
use crate::error::EngineError;
use crate::heuristics::AdaptiveHeuristics;

const QUALITY_MIN: u8 = 1;
const QUALITY_MAX: u8 = 100;

/// Offsets from the estimated quality tried by the probe.
const PROBE_OFFSETS: [i32; 4] = [-10, -5, 0, 5];

/// Half-width of the binary-search window around its seed.
const SEARCH_SPAN: i32 = 20;

/// Qualities tried at every scale factor.
const SCALING_QUALITIES: [u8; 3] = [70, 80, 90];

/// Result of running one phase.
#[derive(Debug)]
pub(crate) enum PhaseOutcome {
    /// A trial landed inside the tolerance band.
    Satisfied(QualityTrial),
    /// Move on to the next phase.
    Continue,
}

/// Run every phase in order. Returns the chosen trial and the phase it came from.
pub(crate) async fn run(
    job: &mut Job,
    heuristics: &AdaptiveHeuristics,
    mode: CompressionMode,
) -> Result<(QualityTrial, Phase), EngineError> {
    if let Some(floor) = floor_check(job, mode).await? {
        info!(
            size = floor.byte_size(),
            target = job.target(),
            "target unreachable, returning smallest output"
        );
        return Ok((floor, Phase::Done));
    }

    let seed = probe(job, heuristics.estimated_quality).await?;
    if let Some(trial) = seed.as_ref().filter(|trial| job.satisfies(trial)) {
        return Ok((trial.clone(), Phase::Probe));
    }

    if !job.search_expired() {
        let outcome = binary_search(job, heuristics, seed.as_ref()).await?;
        if let PhaseOutcome::Satisfied(trial) = outcome {
            return Ok((trial, Phase::BinarySearch));
        }
    } else {
        debug!("deadline reached before binary search");
    }

    if !job.expired() {
        if let PhaseOutcome::Satisfied(trial) = scaling(job, mode).await? {
            return Ok((trial, Phase::Scaling));
        }
    } else {
        debug!("deadline reached before scaling");
    }

    let attempts = job.attempts();
    job.best()
        .cloned()
        .map(|trial| (trial, Phase::Done))
        .ok_or(EngineError::CompressionFailed { attempts })
}

/// Encode the smallest possible output. Returns it when it is still too large.
async fn floor_check(
    job: &mut Job,
    mode: CompressionMode,
) -> Result<Option<QualityTrial>, EngineError> {
    let floor = Candidate::new(QUALITY_MIN, mode.min_scale());
    let trials = job.run_batch(vec![floor]).await?;

    Ok(trials
        .into_iter()
        .next()
        .filter(|trial| trial.byte_size() > job.target() && !job.satisfies(trial)))
}

/// Encode four qualities around the estimate and return the closest trial.
async fn probe(job: &mut Job, estimated: u8) -> Result<Option<QualityTrial>, EngineError> {
    let qualities = clamp_qualities(
        PROBE_OFFSETS.iter().map(|offset| estimated as i32 + offset),
        QUALITY_MIN,
        QUALITY_MAX,
    );
    let candidates = qualities.iter().map(|&q| Candidate::new(q, 1.0)).collect();
    let trials = job.run_batch(candidates).await?;

    let best = select_best(&trials, job.target()).cloned();
    debug!(
        ?qualities,
        best_quality = best.as_ref().map(|t| t.quality),
        best_size = best.as_ref().map(|t| t.byte_size()),
        "probe finished"
    );

    Ok(best)
}

/// Initial `[low, high]` window for the binary search.
fn seed_window(seed: Option<&QualityTrial>, target: u64, estimated: u8) -> (i32, i32) {
    let (low, high) = match seed {
        Some(trial) if trial.byte_size() > target => {
            let q = trial.quality as i32;
            (q - SEARCH_SPAN, q)
        }
        Some(trial) => {
            let q = trial.quality as i32;
            (q, q + SEARCH_SPAN)
        }
        None => {
            let e = estimated as i32;
            (e - SEARCH_SPAN, e + SEARCH_SPAN)
        }
    };
    let clamp = |q: i32| q.clamp(QUALITY_MIN as i32, QUALITY_MAX as i32);
    (clamp(low), clamp(high))
}

async fn binary_search(
    job: &mut Job,
    heuristics: &AdaptiveHeuristics,
    seed: Option<&QualityTrial>,
) -> Result<PhaseOutcome, EngineError> {
    let (mut low, mut high) = seed_window(seed, job.target(), heuristics.estimated_quality);
    let mut iterations = 0;

    while low <= high && iterations < heuristics.max_iterations {
        if job.search_expired() {
            debug!(iterations, "deadline reached during binary search");
            break;
        }

        let mid = (low + high) / 2;
        let candidates = clamp_qualities([mid - 1, mid, mid + 1], QUALITY_MIN, QUALITY_MAX)
            .into_iter()
            .map(|q| Candidate::new(q, 1.0))
            .collect();
        let trials = job.run_batch(candidates).await?;
        iterations += 1;

        let Some(best) = select_best(&trials, job.target()).cloned() else {
            debug!(mid, "every trial in the batch failed, abandoning binary search");
            break;
        };
        debug!(
            low,
            high,
            mid,
            quality = best.quality,
            size = best.byte_size(),
            "binary search step"
        );
        if job.satisfies(&best) {
            return Ok(PhaseOutcome::Satisfied(best));
        }

        if best.byte_size() > job.target() {
            high = (best.quality as i32).min(mid) - 1;
        } else {
            low = (best.quality as i32).max(mid) + 1;
        }
    }

    Ok(PhaseOutcome::Continue)
}

async fn scaling(job: &mut Job, mode: CompressionMode) -> Result<PhaseOutcome, EngineError> {
    let scales = mode.scale_factors();
    let candidates = scales
        .iter()
        .flat_map(|&scale| {
            SCALING_QUALITIES
                .iter()
                .map(move |&quality| Candidate::new(quality, scale))
        })
        .collect();
    let trials = job.run_batch(candidates).await?;

    let per_scale: Vec<QualityTrial> = scales
        .iter()
        .filter_map(|&scale| {
            let at_scale: Vec<QualityTrial> =
                trials.iter().filter(|t| t.scale == scale).cloned().collect();
            select_best(&at_scale, job.target()).cloned()
        })
        .collect();

    let best = select_best(&per_scale, job.target()).cloned();
    debug!(
        scale = best.as_ref().map(|t| t.scale),
        quality = best.as_ref().map(|t| t.quality),
        size = best.as_ref().map(|t| t.byte_size()),
        "scaling finished"
    );

    Ok(match best {
        Some(trial) if job.satisfies(&trial) => PhaseOutcome::Satisfied(trial),
        _ => PhaseOutcome::Continue,
    })
}
