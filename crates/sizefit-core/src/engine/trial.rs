//! Encode trials and the ordering used to pick the best one.
//!
//! A trial is better than another when its size is closer to the target.
//! Equal distances prefer higher quality, then larger scale, so the engine
//! never gives away fidelity it did not need to.

use std::cmp::Ordering;
use std::sync::Arc;

/// Parameters of one encode attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub quality: u8,
    pub scale: f32,
}

impl Candidate {
    pub fn new(quality: u8, scale: f32) -> Self {
        Self { quality, scale }
    }
}

/// A successful encode attempt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QualityTrial {
    pub quality: u8,
    pub scale: f32,
    pub buffer: Arc<Vec<u8>>,
}

impl QualityTrial {
    pub fn new(candidate: Candidate, buffer: Vec<u8>) -> Self {
        Self {
            quality: candidate.quality,
            scale: candidate.scale,
            buffer: Arc::new(buffer),
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn distance(&self, target: u64) -> u64 {
        self.byte_size().abs_diff(target)
    }

    pub fn is_scaled(&self) -> bool {
        self.scale < 1.0
    }

    /// `Less` means `self` ranks ahead of `other` for `target`.
    pub fn rank(&self, other: &Self, target: u64) -> Ordering {
        self.distance(target)
            .cmp(&other.distance(target))
            .then_with(|| other.quality.cmp(&self.quality))
            .then_with(|| other.scale.total_cmp(&self.scale))
    }
}

/// Best-ranked trial in `trials`, if any.
pub(crate) fn select_best(trials: &[QualityTrial], target: u64) -> Option<&QualityTrial> {
    trials.iter().min_by(|a, b| a.rank(b, target))
}

/// Running best across every trial a job has produced.
#[derive(Debug)]
pub(crate) struct BestTrial {
    target: u64,
    best: Option<QualityTrial>,
}

impl BestTrial {
    pub fn new(target: u64) -> Self {
        Self { target, best: None }
    }

    /// Keep `trial` if it ranks ahead of the current best.
    pub fn offer(&mut self, trial: &QualityTrial) {
        let replace = match &self.best {
            Some(current) => trial.rank(current, self.target) == Ordering::Less,
            None => true,
        };
        if replace {
            self.best = Some(trial.clone());
        }
    }

    pub fn get(&self) -> Option<&QualityTrial> {
        self.best.as_ref()
    }
}

/// Clamp raw quality values to `[min, max]` and drop duplicates, keeping order.
pub(crate) fn clamp_qualities(
    raw: impl IntoIterator<Item = i32>,
    min: u8,
    max: u8,
) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for q in raw {
        let q = q.clamp(min as i32, max as i32) as u8;
        if !out.contains(&q) {
            out.push(q);
        }
    }
    out
}


// ============================================================================
// Property-Based Tests
// ============================================================================
