//! Unit of work passed from intake to the worker pool

use std::fmt;
use std::time::{Duration, Instant};

/// Opaque payload produced by intake and consumed by exactly one worker
///
/// Immutable once enqueued; identity is its position in the queue, the
/// sequence number is carried for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    seq: u64,
    message: String,
    received_at: Instant,
}

impl Item {
    /// Create new item stamped with the current instant
    pub fn new(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            message: message.into(),
            received_at: Instant::now(),
        }
    }

    /// Sequence number assigned at intake
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Request-derived content
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Time spent since intake (queue wait + processing so far)
    #[inline]
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.seq, self.message)
    }
}
