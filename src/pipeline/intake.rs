//! Request intake: one inbound unit of work becomes one queued [`Item`]
//!
//! Never blocks the caller. Unlike fire-and-forget intake, the outcome is
//! returned so the transport can answer "overloaded" instead of silently
//! dropping the request.

use std::sync::Arc;
use thiserror::Error;
use tracing::Level;

use crate::core::{BoundedQueue, Item, SequenceCounter};
use crate::infrastructure::metrics::PipelineMetrics;
use crate::log_intake;
use crate::pipeline::shutdown::ShutdownStatus;

/// Why a request was not queued
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Queue at capacity; the item (with this sequence number) was dropped
    #[error("queue full, item #{seq} dropped")]
    QueueFull { seq: u64 },

    /// Shutdown has begun; no item was built
    #[error("shutting down")]
    ShuttingDown,
}

/// Producer side of the pipeline
pub struct IntakeAdapter {
    queue: Arc<BoundedQueue<Item>>,
    sequence: SequenceCounter,
    metrics: Arc<PipelineMetrics>,
    status: ShutdownStatus,
}

impl IntakeAdapter {
    pub fn new(
        queue: Arc<BoundedQueue<Item>>,
        metrics: Arc<PipelineMetrics>,
        status: ShutdownStatus,
    ) -> Self {
        Self {
            queue,
            sequence: SequenceCounter::new(),
            metrics,
            status,
        }
    }

    /// Queue the default greeting for this request
    pub fn submit(&self) -> Result<u64, Rejected> {
        self.submit_with(|seq| format!("Hello, world! {seq}"))
    }

    /// Queue caller-supplied content
    pub fn submit_message(&self, message: impl Into<String>) -> Result<u64, Rejected> {
        let message = message.into();
        self.submit_with(move |_| message)
    }

    /// Build the message from the assigned sequence number and queue it
    ///
    /// Returns the sequence number on success.
    pub fn submit_with<F>(&self, build: F) -> Result<u64, Rejected>
    where
        F: FnOnce(u64) -> String,
    {
        self.metrics.record_request();

        if !self.status.is_running() {
            self.metrics.record_rejected_shutdown();
            log_intake!(Level::DEBUG, "Request refused: shutting down");
            return Err(Rejected::ShuttingDown);
        }

        let seq = self.sequence.next();
        let item = Item::new(seq, build(seq));

        match self.queue.enqueue(item) {
            Ok(()) => {
                self.metrics.record_accepted();
                log_intake!(Level::DEBUG, seq, "Item queued");
                Ok(seq)
            }
            Err(_full) => {
                self.metrics.record_rejected_full();
                log_intake!(
                    Level::WARN,
                    seq,
                    capacity = self.queue.capacity(),
                    "Queue full, dropping item"
                );
                Err(Rejected::QueueFull { seq })
            }
        }
    }

    /// Last sequence number handed out
    pub fn last_seq(&self) -> u64 {
        self.sequence.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::shutdown::ShutdownState;

    type Fixture = (
        Arc<BoundedQueue<Item>>,
        Arc<PipelineMetrics>,
        ShutdownStatus,
        IntakeAdapter,
    );

    fn adapter(capacity: usize) -> Fixture {
        let queue = Arc::new(BoundedQueue::new(capacity).unwrap());
        let metrics = Arc::new(PipelineMetrics::new());
        let status = ShutdownStatus::new();
        let intake = IntakeAdapter::new(Arc::clone(&queue), Arc::clone(&metrics), status.clone());
        (queue, metrics, status, intake)
    }

    #[test]
    fn test_submit_builds_greeting() {
        let (queue, _metrics, _status, intake) = adapter(4);

        assert_eq!(intake.submit(), Ok(1));
        assert_eq!(intake.submit(), Ok(2));

        let first = queue.dequeue().unwrap();
        assert_eq!(first.seq(), 1);
        assert_eq!(first.message(), "Hello, world! 1");
        assert_eq!(queue.dequeue().unwrap().message(), "Hello, world! 2");
    }

    #[test]
    fn test_submit_message_keeps_content() {
        let (queue, _metrics, _status, intake) = adapter(4);

        assert_eq!(intake.submit_message("payload"), Ok(1));
        assert_eq!(queue.dequeue().unwrap().message(), "payload");
    }

    #[test]
    fn test_full_queue_is_reported() {
        let (queue, metrics, _status, intake) = adapter(2);

        assert!(intake.submit().is_ok());
        assert!(intake.submit().is_ok());
        assert_eq!(intake.submit(), Err(Rejected::QueueFull { seq: 3 }));
        assert_eq!(queue.len(), 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.rejected_full, 1);
    }

    #[test]
    fn test_refuses_once_draining() {
        let (queue, metrics, status, intake) = adapter(2);

        assert!(status.advance(ShutdownState::Draining));
        assert_eq!(intake.submit(), Err(Rejected::ShuttingDown));
        assert!(queue.is_empty());
        assert_eq!(intake.last_seq(), 0);
        assert_eq!(metrics.snapshot().rejected_shutdown, 1);
    }

    #[test]
    fn test_concurrent_submit_distinct_sequences() {
        use std::collections::HashSet;
        use std::thread;

        let (queue, _metrics, _status, intake) = adapter(1_000);
        let intake = Arc::new(intake);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let intake = Arc::clone(&intake);
                thread::spawn(move || {
                    for _ in 0..100 {
                        intake.submit().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seqs: HashSet<u64> = std::iter::from_fn(|| queue.dequeue().ok())
            .map(|item| item.seq())
            .collect();
        assert_eq!(seqs.len(), 400);
        assert_eq!(intake.last_seq(), 400);
    }
}
