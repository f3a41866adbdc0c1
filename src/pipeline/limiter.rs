//! Admission limiter for worker slots
//!
//! A counting semaphore capped at the configured worker count. A slot is
//! acquired before a worker is launched and held by the worker for its whole
//! life; dropping the [`AdmissionPermit`] releases it, so normal return,
//! panic unwinding and task abort all give the slot back exactly once.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::{PipelineError, Result};

/// Caps the number of concurrently running workers
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// One occupied worker slot, released on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionLimiter {
    /// Create limiter with `limit` free slots
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Take a slot without waiting
    ///
    /// # Errors
    /// [`PipelineError::AdmissionUnavailable`] when every slot is in use or
    /// the limiter has been closed.
    pub fn try_acquire(&self) -> Result<AdmissionPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => {
                Err(PipelineError::AdmissionUnavailable)
            }
        }
    }

    /// Wait for a slot
    ///
    /// # Errors
    /// [`PipelineError::AdmissionUnavailable`] if the limiter is closed while waiting.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map(|permit| AdmissionPermit { _permit: permit })
            .map_err(|_| PipelineError::AdmissionUnavailable)
    }

    /// Refuse all future acquisitions; held permits stay valid
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Slots currently held
    #[inline]
    pub fn in_use(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    /// Slots currently free
    #[inline]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured ceiling
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}
