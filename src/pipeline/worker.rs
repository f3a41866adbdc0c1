//! Consumer loop run by each pooled worker

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::core::{BoundedQueue, Empty, Item};
use crate::infrastructure::metrics::PipelineMetrics;
use crate::log_worker;
use crate::pipeline::handler::{run_bounded, HandlerError, ItemHandler};
use crate::pipeline::limiter::AdmissionPermit;

/// Timing knobs copied into each worker
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerTiming {
    pub idle_backoff: Duration,
    pub cycle_delay: Duration,
    pub quiesce: Duration,
    pub handler_timeout: Duration,
}

/// Everything one consumer loop owns
///
/// Dropping the context (normal exit or task abort) releases the permit.
pub(crate) struct WorkerContext<H> {
    pub id: usize,
    pub queue: Arc<BoundedQueue<Item>>,
    pub handler: Arc<H>,
    pub metrics: Arc<PipelineMetrics>,
    pub timing: WorkerTiming,
    pub stop: CancellationToken,
    pub permit: AdmissionPermit,
}

/// Consumer loop for a single worker.
///
/// Repeats until the stop token fires: dequeue one item, run the handler
/// under its time bound, optionally throttle. On an empty queue the worker
/// parks until an enqueue, the idle backoff elapsing, or stop, whichever comes
/// first. After stop it sleeps the quiesce delay and exits, leaving any queued
/// items behind.
///
/// Returns the worker id so the pool can match completions.
pub(crate) async fn worker_loop<H: ItemHandler>(ctx: WorkerContext<H>) -> usize {
    let WorkerContext {
        id,
        queue,
        handler,
        metrics,
        timing,
        stop,
        permit,
    } = ctx;

    log_worker!(Level::DEBUG, worker = id, "Worker started");

    while !stop.is_cancelled() {
        match queue.dequeue() {
            Ok(item) => {
                process(id, &item, handler.as_ref(), &metrics, timing.handler_timeout).await;

                if !timing.cycle_delay.is_zero() {
                    tokio::select! {
                        () = stop.cancelled() => {}
                        () = tokio::time::sleep(timing.cycle_delay) => {}
                    }
                }
            }
            Err(Empty) => {
                log_worker!(Level::TRACE, worker = id, "Queue empty, idling");
                tokio::select! {
                    () = stop.cancelled() => {}
                    () = queue.item_ready() => {}
                    () = tokio::time::sleep(timing.idle_backoff) => {}
                }
            }
        }
    }

    log_worker!(Level::INFO, worker = id, "Stopping worker...");
    tokio::time::sleep(timing.quiesce).await;
    log_worker!(Level::INFO, worker = id, "Worker stopped.");

    drop(permit);
    id
}

async fn process<H: ItemHandler>(
    id: usize,
    item: &Item,
    handler: &H,
    metrics: &PipelineMetrics,
    limit: Duration,
) {
    match run_bounded(handler, id, item, limit).await {
        Ok(()) => {
            metrics.record_processed();
            log_worker!(Level::DEBUG, worker = id, seq = item.seq(), "Item processed");
        }
        Err(e @ HandlerError::Failed(_)) => {
            metrics.record_failed();
            log_worker!(Level::WARN, worker = id, seq = item.seq(), "Error: {}", e);
        }
        Err(e @ HandlerError::TimedOut(_)) => {
            metrics.record_timed_out();
            log_worker!(Level::WARN, worker = id, seq = item.seq(), "Error: {}", e);
        }
        Err(e @ HandlerError::Panicked(_)) => {
            metrics.record_panicked();
            log_worker!(Level::ERROR, worker = id, seq = item.seq(), "Error: {}", e);
        }
    }
}
