//! Infrastructure - cold path only
//!
//! This module contains the outer surfaces around the pipeline:
//! - HTTP transport and stats endpoint
//! - Configuration management
//! - Logging and metrics

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{ApiConfig, ConfigError, LoggingConfig};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
