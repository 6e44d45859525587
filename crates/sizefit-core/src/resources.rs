//! Admission control for concurrent compression jobs.
//!
//! A single atomic counter with a fixed ceiling. Rejection is immediate; there
//! is no queue. Admitted work holds a [`JobPermit`] that gives its slot back
//! when dropped, so a job that errors or panics never leaks a slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::EngineError;

/// Process-wide job counter with a fixed ceiling.
#[derive(Debug)]
pub struct ResourceManager {
    active: AtomicUsize,
    max_jobs: usize,
}

impl ResourceManager {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_jobs,
        }
    }

    /// Whether a new job would currently be admitted.
    pub fn can_admit(&self) -> bool {
        self.active.load(Ordering::Acquire) < self.max_jobs
    }

    /// Claim a slot, or fail with [`EngineError::Busy`] without touching the counter.
    pub fn try_admit(self: &Arc<Self>) -> Result<JobPermit, EngineError> {
        let claimed = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.max_jobs).then_some(active + 1)
            });

        match claimed {
            Ok(previous) => {
                trace!(active = previous + 1, max = self.max_jobs, "job admitted");
                Ok(JobPermit {
                    manager: Arc::clone(self),
                })
            }
            Err(active) => Err(EngineError::Busy {
                active,
                limit: self.max_jobs,
            }),
        }
    }

    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    fn release(&self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "released more permits than were issued");
        trace!(active = previous - 1, "job released");
    }
}

/// An admitted job's slot. Dropping it releases the slot exactly once.
#[derive(Debug)]
#[must_use = "dropping the permit immediately releases the job slot"]
pub struct JobPermit {
    manager: Arc<ResourceManager>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.manager.release();
    }
}
