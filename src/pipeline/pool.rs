//! Worker pool draining the shared queue
//!
//! Launches a fixed number of consumer loops, each holding one slot of the
//! [`AdmissionLimiter`]. Stop is a single broadcast: every worker listens on a
//! child of the pool's root [`CancellationToken`], so cancelling the root
//! reaches all of them, while one worker can still be retired on its own.

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::core::{BoundedQueue, Item};
use crate::infrastructure::config::WorkerConfig;
use crate::infrastructure::metrics::PipelineMetrics;
use crate::log_worker;
use crate::pipeline::handler::ItemHandler;
use crate::pipeline::limiter::AdmissionLimiter;
use crate::pipeline::worker::{worker_loop, WorkerContext, WorkerTiming};
use crate::{PipelineError, Result};

/// A pool of consumers pulling [`Item`]s from a [`BoundedQueue`].
pub struct WorkerPool<H: ItemHandler> {
    queue: Arc<BoundedQueue<Item>>,
    handler: Arc<H>,
    metrics: Arc<PipelineMetrics>,
    config: WorkerConfig,
    limiter: AdmissionLimiter,
    stop: CancellationToken,
    workers: Mutex<HashMap<usize, CancellationToken>>,
    tasks: Mutex<JoinSet<usize>>,
    next_id: AtomicUsize,
}

impl<H: ItemHandler> WorkerPool<H> {
    /// Create an idle pool; the admission limit is `config.count`
    pub fn new(
        queue: Arc<BoundedQueue<Item>>,
        handler: Arc<H>,
        metrics: Arc<PipelineMetrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            limiter: AdmissionLimiter::new(config.count),
            queue,
            handler,
            metrics,
            config,
            stop: CancellationToken::new(),
            workers: Mutex::new(HashMap::new()),
            tasks: Mutex::new(JoinSet::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Fill every free slot with a worker; returns how many were launched
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<usize> {
        let mut started = 0;
        while self.limiter.available() > 0 {
            self.add_worker()?;
            started += 1;
        }
        log_worker!(Level::INFO, "Worker pool started with {} workers", started);
        Ok(started)
    }

    /// Launch one more worker if a slot is free
    ///
    /// The slot is acquired before the task is spawned.
    ///
    /// # Errors
    /// [`PipelineError::AdmissionUnavailable`] if all slots are taken or the
    /// pool is stopping.
    pub fn add_worker(&self) -> Result<usize> {
        if self.stop.is_cancelled() {
            return Err(PipelineError::AdmissionUnavailable);
        }
        let permit = self.limiter.try_acquire()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.stop.child_token();
        let ctx = WorkerContext {
            id,
            queue: Arc::clone(&self.queue),
            handler: Arc::clone(&self.handler),
            metrics: Arc::clone(&self.metrics),
            timing: self.timing(),
            stop: token.clone(),
            permit,
        };

        self.reap();
        self.workers.lock().insert(id, token);
        self.tasks.lock().spawn(supervised(id, worker_loop(ctx)));

        Ok(id)
    }

    /// Forget workers that have already exited
    fn reap(&self) {
        let mut tasks = self.tasks.lock();
        while let Some(done) = tasks.try_join_next() {
            match done {
                Ok(id) => {
                    self.workers.lock().remove(&id);
                }
                Err(e) => log_worker!(Level::ERROR, "Worker task failed: {}", e),
            }
        }
    }

    /// Ask one worker to stop; its slot frees once it has quiesced
    ///
    /// Returns `false` for an unknown or already retired id.
    pub fn retire_worker(&self, id: usize) -> bool {
        match self.workers.lock().remove(&id) {
            Some(token) => {
                log_worker!(Level::INFO, worker = id, "Retiring worker");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Broadcast stop to every worker and wait for them to exit
    ///
    /// Queued items are left in place. Waiting is bounded by `join_timeout`;
    /// stragglers are aborted, which still releases their slots.
    ///
    /// # Errors
    /// [`PipelineError::ShutdownTimeout`] if the bound was hit.
    pub async fn shutdown(&self, join_timeout: Duration) -> Result<()> {
        log_worker!(Level::INFO, "Stopping {} workers", self.running());
        self.stop.cancel();
        self.limiter.close();

        let mut tasks = std::mem::take(&mut *self.tasks.lock());

        let joined = tokio::time::timeout(join_timeout, async {
            while let Some(done) = tasks.join_next().await {
                match done {
                    Ok(id) => {
                        log_worker!(Level::DEBUG, worker = id, "Worker exit acknowledged")
                    }
                    Err(e) => log_worker!(Level::ERROR, "Worker task failed: {}", e),
                }
            }
        })
        .await;

        self.workers.lock().clear();

        match joined {
            Ok(()) => {
                log_worker!(
                    Level::INFO,
                    left_in_queue = self.queue.len(),
                    "Worker pool shutdown complete"
                );
                Ok(())
            }
            Err(_) => {
                log_worker!(
                    Level::WARN,
                    "{} workers still running after {:?}, aborting",
                    tasks.len(),
                    join_timeout
                );
                tasks.shutdown().await;
                Err(PipelineError::ShutdownTimeout {
                    stage: "worker pool",
                    after: join_timeout,
                })
            }
        }
    }

    /// Workers currently holding a slot
    #[inline]
    pub fn running(&self) -> usize {
        self.limiter.in_use()
    }

    /// Shared view of the admission limiter (for diagnostics)
    pub fn limiter(&self) -> AdmissionLimiter {
        self.limiter.clone()
    }

    /// Whether stop has been broadcast
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Workers with a live stop token, after reaping exited ones
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.reap();
        self.workers.lock().len()
    }

    fn timing(&self) -> WorkerTiming {
        WorkerTiming {
            idle_backoff: self.config.idle_backoff(),
            cycle_delay: self.config.cycle_delay(),
            quiesce: self.config.quiesce(),
            handler_timeout: self.config.handler_timeout(),
        }
    }
}

/// Run a worker loop, reporting its id even if the loop panics
///
/// The permit lives inside the loop's context and is released by unwinding.
pub(crate) async fn supervised<F>(id: usize, worker: F) -> usize
where
    F: Future<Output = usize>,
{
    match AssertUnwindSafe(worker).catch_unwind().await {
        Ok(id) => id,
        Err(_) => {
            log_worker!(Level::ERROR, worker = id, "Worker loop panicked");
            id
        }
    }
}
