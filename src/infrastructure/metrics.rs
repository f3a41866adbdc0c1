//! Metrics collection for pipeline monitoring
//!
//! Lock-free counters updated by intake and workers.
//! Snapshots taken for API export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Pipeline metrics collector
///
/// Thread-safe counters shared by every request handler and worker.
pub struct PipelineMetrics {
    /// Intake requests seen
    requests: AtomicU64,
    /// Items placed in the queue
    accepted: AtomicU64,
    /// Items dropped because the queue was full
    rejected_full: AtomicU64,
    /// Requests refused because shutdown had begun
    rejected_shutdown: AtomicU64,
    /// Items handled successfully
    processed: AtomicU64,
    /// Items whose handler returned an error
    failed: AtomicU64,
    /// Items whose handler exceeded its time bound
    timed_out: AtomicU64,
    /// Items whose handler panicked
    panicked: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub accepted: u64,
    pub rejected_full: u64,
    pub rejected_shutdown: u64,
    pub processed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
    pub accept_rate: f64, // accepted items per second
    pub uptime_seconds: u64,
}

impl PipelineMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected_full: AtomicU64::new(0),
            rejected_shutdown: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected_shutdown(&self) {
        self.rejected_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let accepted = self.accepted.load(Ordering::Relaxed);

        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            accepted as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            accepted,
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            rejected_shutdown: self.rejected_shutdown.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            accept_rate: rate,
            uptime_seconds: uptime,
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
