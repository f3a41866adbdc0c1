//! Coordinated two-phase shutdown
//!
//! Both termination triggers, an OS signal and the transport exiting on its
//! own, run through [`ShutdownCoordinator::run`]:
//!
//! ```text
//! Running --signal--> Draining --transport stopped, workers joined--> Terminated
//! Running --transport exited unprompted--> (workers joined) --> TerminatedWithError
//! ```
//!
//! Every wait is bounded: the transport by `transport_timeout`, the workers by
//! their quiesce delay plus an outer `worker_join_timeout`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::ShutdownConfig;
use crate::pipeline::handler::ItemHandler;
use crate::pipeline::pool::WorkerPool;
use crate::{PipelineError, Result};

/// Process-wide lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Running = 0,
    Draining = 1,
    Terminated = 2,
    TerminatedWithError = 3,
}

impl ShutdownState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            2 => Self::Terminated,
            _ => Self::TerminatedWithError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
            Self::TerminatedWithError => "terminated_with_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::TerminatedWithError)
    }

    /// Edges of the state machine
    fn can_advance_to(self, next: ShutdownState) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Draining)
                | (Self::Draining, Self::Terminated)
                | (Self::Running, Self::TerminatedWithError)
        )
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, lock-free view of the [`ShutdownState`]
///
/// Cloned into intake and the HTTP layer so they can refuse work once the
/// state leaves `Running`. Only the coordinator advances it.
#[derive(Debug, Clone)]
pub struct ShutdownStatus {
    state: Arc<AtomicU8>,
}

impl ShutdownStatus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ShutdownState::Running as u8)),
        }
    }

    #[inline]
    pub fn get(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.get() == ShutdownState::Running
    }

    /// Move to `next` if that is a legal edge from the current state
    ///
    /// Returns `false` and leaves the state untouched otherwise.
    pub(crate) fn advance(&self, next: ShutdownState) -> bool {
        let mut current = self.get();
        loop {
            if !current.can_advance_to(next) {
                return false;
            }
            match self.state.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = ShutdownState::from_u8(actual),
            }
        }
    }
}

impl Default for ShutdownStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// A running transport: a stop token plus its completion signal
pub struct TransportHandle {
    name: &'static str,
    stop: CancellationToken,
    task: JoinHandle<Result<()>>,
    finished: bool,
}

impl TransportHandle {
    /// Spawn a transport future that must return once `stop` is cancelled
    pub fn spawn<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let task = tokio::spawn(run(stop.clone()));
        Self {
            name,
            stop,
            task,
            finished: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve when the transport exits for any reason
    ///
    /// Cancel-safe: dropping this future leaves the transport running.
    pub async fn wait(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let result = (&mut self.task).await;
        self.finished = true;
        result.unwrap_or_else(|e| Err(PipelineError::Transport(e.to_string())))
    }

    /// Request a stop and wait at most `limit` for the transport to exit
    ///
    /// # Errors
    /// [`PipelineError::ShutdownTimeout`] if it did not exit in time (the task
    /// is then aborted), or the transport's own error.
    pub async fn stop(&mut self, limit: Duration) -> Result<()> {
        self.stop.cancel();
        if self.finished {
            return Ok(());
        }
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(result) => result,
            Err(_) => {
                self.task.abort();
                Err(PipelineError::ShutdownTimeout {
                    stage: self.name,
                    after: limit,
                })
            }
        }
    }
}

enum Trigger {
    Signal,
    TransportExited(Result<()>),
}

/// Drives the ordered shutdown and publishes progress through [`ShutdownStatus`]
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    status: ShutdownStatus,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig, status: ShutdownStatus) -> Self {
        Self { config, status }
    }

    pub fn status(&self) -> &ShutdownStatus {
        &self.status
    }

    /// Block until `signal` fires or the transport exits, then shut down
    ///
    /// Always stops the workers before returning, whichever trigger fired.
    /// Returns the terminal state.
    pub async fn run<S, H>(
        &self,
        signal: S,
        mut transport: TransportHandle,
        pool: &WorkerPool<H>,
    ) -> ShutdownState
    where
        S: Future<Output = ()>,
        H: ItemHandler,
    {
        tokio::pin!(signal);

        let trigger = tokio::select! {
            () = &mut signal => Trigger::Signal,
            result = transport.wait() => Trigger::TransportExited(result),
        };

        match trigger {
            Trigger::Signal => {
                tracing::info!("Signal received, starting shutdown");
                self.status.advance(ShutdownState::Draining);

                // 1. Stop intake first
                tracing::info!("Stopping {} transport", transport.name());
                match transport.stop(self.config.transport_timeout()).await {
                    Ok(()) => tracing::info!("{} transport stopped", transport.name()),
                    Err(e @ PipelineError::ShutdownTimeout { .. }) => {
                        tracing::warn!("{}; proceeding with worker shutdown", e)
                    }
                    Err(e) => tracing::warn!("Transport stopped with error: {}", e),
                }

                // 2. Then the workers
                self.stop_workers(pool).await;

                self.status.advance(ShutdownState::Terminated);
                tracing::info!("Shutdown complete");
                ShutdownState::Terminated
            }
            Trigger::TransportExited(result) => {
                match result {
                    Ok(()) => tracing::error!(
                        "{} transport exited without a shutdown request",
                        transport.name()
                    ),
                    Err(e) => {
                        tracing::error!("failed to run the {} transport: {}", transport.name(), e)
                    }
                }

                self.stop_workers(pool).await;

                self.status.advance(ShutdownState::TerminatedWithError);
                ShutdownState::TerminatedWithError
            }
        }
    }

    async fn stop_workers<H: ItemHandler>(&self, pool: &WorkerPool<H>) {
        tracing::info!("Starting worker shutdown");
        if let Err(e) = pool.shutdown(self.config.worker_join_timeout()).await {
            tracing::warn!("{}", e);
        }
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM
///
/// A source whose handler cannot be installed is logged and never fires.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
