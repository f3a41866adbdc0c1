//! Bounded HTTP intake with a draining worker pool
//!
//! # Architecture
//! - **core**: ring buffer, items, sequence numbers
//! - **pipeline**: intake, workers, admission limiter, shutdown coordinator
//! - **infrastructure**: cold path (logging, metrics, config, api)

use ring_intake::engine::PipelineEngine;
use ring_intake::infrastructure::logging::init_logging;
use ring_intake::pipeline::{termination_signal, ShutdownState};
use ring_intake::Config;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Load config before logging so the log settings apply
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Guards flush the file appenders on drop
    let _guards = match init_logging(&config.logging) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match PipelineEngine::new(config).run(termination_signal()).await {
        Ok(ShutdownState::Terminated) => ExitCode::SUCCESS,
        Ok(state) => {
            tracing::error!("Exited in state {}", state);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
