//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by type:
//! - main/ - All application logs (JSON)
//! - error/ - Error and warning logs only
//! - intake/ - Request intake logs
//! - worker/ - Worker pool logs

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::infrastructure::config::LoggingConfig;
use crate::{PipelineError, Result};

const LOG_TYPES: [&str; 4] = ["main", "error", "intake", "worker"];

/// Initialize console and (optionally) rolling file logging
///
/// `RUST_LOG` takes precedence over `config.level`. The returned guards flush
/// the non-blocking writers and must be kept alive for the whole program.
///
/// # Errors
/// Fails if the log directories cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| PipelineError::Config(format!("invalid log level: {e}")))?;

    // Console layer
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let mut guards = Vec::new();
    let mut file_layers = Vec::new();

    if config.file_output {
        prepare_dirs(&config.dir)?;

        let (main_appender, main_guard) = create_appender(&config.dir, "main");
        guards.push(main_guard);
        let (error_appender, error_guard) = create_appender(&config.dir, "error");
        guards.push(error_guard);
        let (intake_appender, intake_guard) = create_appender(&config.dir, "intake");
        guards.push(intake_guard);
        let (worker_appender, worker_guard) = create_appender(&config.dir, "worker");
        guards.push(worker_guard);

        // Main log - all logs
        let main_layer = tracing_subscriber::fmt::layer()
            .with_writer(main_appender)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .json();

        // Error log - ERROR and WARN only
        let error_layer = tracing_subscriber::fmt::layer()
            .with_writer(error_appender)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

        let intake_layer = tracing_subscriber::fmt::layer()
            .with_writer(intake_appender)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                is_intake_target(metadata.target())
            }));

        let worker_layer = tracing_subscriber::fmt::layer()
            .with_writer(worker_appender)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                is_worker_target(metadata.target())
            }));

        file_layers.push(main_layer.boxed());
        file_layers.push(error_layer.boxed());
        file_layers.push(intake_layer.boxed());
        file_layers.push(worker_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layers)
        .with(console_layer)
        .try_init()
        .map_err(|e| PipelineError::Config(format!("logging already initialized: {e}")))?;

    if config.file_output {
        tracing::info!("Logging system initialized. Log files in {}", config.dir.display());
    }

    Ok(guards)
}

fn prepare_dirs(root: &Path) -> Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(root.join(log_type))?;
    }
    Ok(())
}

/// Create a rolling file appender
fn create_appender(root: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, root.join(name), name);

    tracing_appender::non_blocking(appender)
}

fn is_intake_target(target: &str) -> bool {
    target == "intake" || target.ends_with("::intake") || target.ends_with("::api")
}

fn is_worker_target(target: &str) -> bool {
    target == "worker" || target.ends_with("::worker") || target.ends_with("::pool")
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_intake {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "intake", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_worker {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "worker", $level, $($arg)+)
    };
}
