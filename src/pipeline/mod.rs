//! Pipeline stages: intake, consumption, shutdown
//!
//! - intake: request -> queued item, non-blocking
//! - worker/pool: consumers draining the queue
//! - limiter: admission slots held by running workers
//! - shutdown: transport-first, workers-second stop sequence

pub mod handler;
pub mod intake;
pub mod limiter;
pub mod pool;
pub mod shutdown;
mod worker;

pub use handler::{HandlerError, ItemHandler, LogHandler};
pub use intake::{IntakeAdapter, Rejected};
pub use limiter::{AdmissionLimiter, AdmissionPermit};
pub use pool::WorkerPool;
pub use shutdown::{
    termination_signal, ShutdownCoordinator, ShutdownState, ShutdownStatus, TransportHandle,
};
