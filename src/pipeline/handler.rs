//! Pluggable side effect performed by workers
//!
//! A handler failure stays local to the worker: it is recorded and logged,
//! then the worker moves on to the next item.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::core::Item;
use crate::log_worker;

/// Why processing a single item did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler exceeded {0:?}")]
    TimedOut(Duration),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Work performed on each dequeued item
pub trait ItemHandler: Send + Sync + 'static {
    fn handle(
        &self,
        worker_id: usize,
        item: &Item,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

/// Default handler: logs the item, optionally simulating work
#[derive(Debug, Clone, Default)]
pub struct LogHandler {
    delay: Duration,
}

impl LogHandler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Simulated work per item
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl ItemHandler for LogHandler {
    async fn handle(&self, worker_id: usize, item: &Item) -> Result<(), HandlerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        log_worker!(
            Level::INFO,
            worker = worker_id,
            seq = item.seq(),
            age_ms = item.age().as_millis() as u64,
            "Dequeued: {}",
            item.message()
        );
        Ok(())
    }
}

/// Run the handler bounded by `limit`, converting a panic into an error
pub(crate) async fn run_bounded<H: ItemHandler>(
    handler: &H,
    worker_id: usize,
    item: &Item,
    limit: Duration,
) -> Result<(), HandlerError> {
    // Building the future can panic too, so the call happens inside the guard
    let guarded =
        AssertUnwindSafe(async move { handler.handle(worker_id, item).await }).catch_unwind();

    match tokio::time::timeout(limit, guarded).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(HandlerError::Panicked(panic_message(&*payload))),
        Err(_) => Err(HandlerError::TimedOut(limit)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
