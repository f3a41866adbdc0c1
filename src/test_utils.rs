//! Test utilities: scripted handlers and fast timing
//!
//! Handlers record what they saw so pool and coordinator tests can assert on
//! delivery without real side effects.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::Item;
use crate::infrastructure::config::{Config, WorkerConfig};
use crate::pipeline::handler::{HandlerError, ItemHandler};

/// Worker timing short enough for unit tests
pub fn fast_worker_config(count: usize) -> WorkerConfig {
    WorkerConfig {
        count,
        idle_backoff_ms: 10,
        cycle_delay_ms: 0,
        quiesce_ms: 30,
        handler_timeout_ms: 500,
        processing_delay_ms: 0,
    }
}

/// Whole config with fast timing and no file logging
pub fn fast_config(capacity: usize, workers: usize) -> Config {
    let mut config = Config::default();
    config.queue.capacity = capacity;
    config.workers = fast_worker_config(workers);
    config.shutdown.transport_timeout_secs = 1;
    config.shutdown.worker_join_timeout_secs = 2;
    config.logging.file_output = false;
    config
}

/// Records `(worker_id, seq)` for every item it completes
#[derive(Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<(usize, u64)>>>,
    in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Completed items in completion order
    pub fn seen(&self) -> Vec<(usize, u64)> {
        self.seen.lock().clone()
    }

    /// Sequence numbers of completed items, sorted
    pub fn seqs(&self) -> Vec<u64> {
        let mut seqs: Vec<u64> = self.seen.lock().iter().map(|&(_, seq)| seq).collect();
        seqs.sort_unstable();
        seqs
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl ItemHandler for RecordingHandler {
    async fn handle(&self, worker_id: usize, item: &Item) -> Result<(), HandlerError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.seen.lock().push((worker_id, item.seq()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every odd sequence number
#[derive(Clone, Copy, Default)]
pub struct FailingHandler;

impl ItemHandler for FailingHandler {
    async fn handle(&self, _worker_id: usize, item: &Item) -> Result<(), HandlerError> {
        if item.seq() % 2 == 1 {
            Err(HandlerError::Failed(format!("odd seq {}", item.seq())))
        } else {
            Ok(())
        }
    }
}

/// Panics on one sequence number, records the rest
#[derive(Clone, Default)]
pub struct PanickingHandler {
    target: u64,
    inner: RecordingHandler,
}

impl PanickingHandler {
    pub fn on_seq(target: u64) -> Self {
        Self {
            target,
            inner: RecordingHandler::new(),
        }
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.inner.seqs()
    }
}

impl ItemHandler for PanickingHandler {
    async fn handle(&self, worker_id: usize, item: &Item) -> Result<(), HandlerError> {
        if item.seq() == self.target {
            panic!("panic on seq {}", item.seq());
        }
        self.inner.handle(worker_id, item).await
    }
}

/// Panics while building the future for one sequence number
///
/// Exercises handlers written as `fn handle(..) -> impl Future` that check
/// their input before returning an `async` block.
#[derive(Clone, Default)]
pub struct EagerPanicHandler {
    target: u64,
    inner: RecordingHandler,
}

impl EagerPanicHandler {
    pub fn on_seq(target: u64) -> Self {
        Self {
            target,
            inner: RecordingHandler::new(),
        }
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.inner.seqs()
    }
}

impl ItemHandler for EagerPanicHandler {
    fn handle(
        &self,
        worker_id: usize,
        item: &Item,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        assert!(item.seq() != self.target, "bad item: seq {}", item.seq());
        let seen = Arc::clone(&self.inner.seen);
        let seq = item.seq();
        async move {
            seen.lock().push((worker_id, seq));
            Ok(())
        }
    }
}
