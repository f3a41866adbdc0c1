//! Bounded intake pipeline with graceful shutdown
//!
//! Inbound HTTP requests become items in a fixed-capacity ring buffer;
//! a pool of workers drains it. A coordinator stops the transport first,
//! then the workers, each step bounded by a timeout.

pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod pipeline;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::{Config, QueueConfig, ShutdownConfig, WorkerConfig};

use std::time::Duration;
use thiserror::Error;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid queue capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{stage} did not stop within {after:?}")]
    ShutdownTimeout { stage: &'static str, after: Duration },

    #[error("No admission slot available")]
    AdmissionUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
