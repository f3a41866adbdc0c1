//! Core Application Engine
//!
//! Builds the queue, worker pool, intake and HTTP transport from one
//! [`Config`], then hands control to the [`ShutdownCoordinator`] until a
//! terminal state is reached.

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::BoundedQueue;
use crate::infrastructure::api::{self, AppState};
use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::PipelineMetrics;
use crate::pipeline::handler::{ItemHandler, LogHandler};
use crate::pipeline::intake::IntakeAdapter;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::shutdown::{ShutdownCoordinator, ShutdownState, ShutdownStatus};
use crate::Result;

/// Main engine owning the pipeline lifecycle
pub struct PipelineEngine<H: ItemHandler = LogHandler> {
    config: Config,
    handler: Arc<H>,
}

impl PipelineEngine<LogHandler> {
    /// Engine with the default logging handler
    pub fn new(config: Config) -> Self {
        let handler = LogHandler::new(config.workers.processing_delay());
        Self::with_handler(config, handler)
    }
}

impl<H: ItemHandler> PipelineEngine<H> {
    pub fn with_handler(config: Config, handler: H) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured address and run until `signal` fires or the
    /// transport dies
    ///
    /// # Errors
    /// Only startup failures; shutdown problems are reflected in the
    /// returned state.
    pub async fn run<S>(self, signal: S) -> Result<ShutdownState>
    where
        S: Future<Output = ()>,
    {
        let listener = api::bind(&self.config.api).await?;
        self.run_with_listener(listener, signal).await
    }

    /// Same as [`run`](Self::run) on an already bound listener
    pub async fn run_with_listener<S>(
        self,
        listener: TcpListener,
        signal: S,
    ) -> Result<ShutdownState>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(
            capacity = self.config.queue.capacity,
            workers = self.config.workers.count,
            "Starting pipeline"
        );

        // 1. Shared state
        let queue = Arc::new(BoundedQueue::new(self.config.queue.capacity)?);
        let metrics = Arc::new(PipelineMetrics::new());
        let status = ShutdownStatus::new();

        // 2. Consumers before producers
        let pool = WorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&self.handler),
            Arc::clone(&metrics),
            self.config.workers.clone(),
        );
        pool.start()?;

        // 3. Intake and transport
        let intake = Arc::new(IntakeAdapter::new(
            Arc::clone(&queue),
            Arc::clone(&metrics),
            status.clone(),
        ));
        let state = AppState {
            intake,
            queue: Arc::clone(&queue),
            metrics: Arc::clone(&metrics),
            status: status.clone(),
            limiter: pool.limiter(),
        };
        let transport = api::spawn_transport(listener, state);

        // 4. Block until a trigger, then stop in order
        let coordinator = ShutdownCoordinator::new(self.config.shutdown.clone(), status);
        let outcome = coordinator.run(signal, transport, &pool).await;

        let snapshot = metrics.snapshot();
        tracing::info!(
            state = %outcome,
            accepted = snapshot.accepted,
            processed = snapshot.processed,
            rejected = snapshot.rejected_full + snapshot.rejected_shutdown,
            abandoned = queue.len(),
            "Pipeline stopped"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fast_config, RecordingHandler};
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_request_is_processed_then_shutdown_terminates() {
        let handler = RecordingHandler::new();
        let engine = PipelineEngine::with_handler(fast_config(16, 2), handler.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let run = tokio::spawn(engine.run_with_listener(listener, async {
            let _ = rx.await;
        }));

        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("Welcome to my website!"));

        let deadline = Instant::now() + Duration::from_secs(2);
        while handler.seqs() != vec![1] {
            assert!(Instant::now() < deadline, "item not processed");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(()).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown should be bounded")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ShutdownState::Terminated);
    }

    #[tokio::test]
    async fn test_zero_capacity_fails_startup() {
        let engine = PipelineEngine::with_handler(fast_config(0, 1), RecordingHandler::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = engine.run_with_listener(listener, std::future::pending()).await;
        assert!(matches!(result, Err(crate::PipelineError::InvalidCapacity(0))));
    }

    #[test]
    fn test_default_handler_uses_processing_delay() {
        let mut config = Config::default();
        config.workers.processing_delay_ms = 25;

        let engine = PipelineEngine::new(config.clone());
        assert_eq!(engine.config(), &config);
        assert_eq!(engine.handler.delay(), Duration::from_millis(25));
    }
}
