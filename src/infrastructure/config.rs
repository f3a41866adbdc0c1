//! Configuration management for the intake pipeline
//!
//! Loads configuration from config.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Pipeline Configuration
///
/// Loaded from config.toml at startup. Every section and field falls back to
/// its default when omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ring buffer settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum number of resident items
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of concurrent consumers (also the admission limit)
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Wait after an empty poll before polling again
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Throttle between successful processing cycles
    #[serde(default)]
    pub cycle_delay_ms: u64,

    /// Delay a worker spends after observing stop, before exiting
    #[serde(default = "default_quiesce_ms")]
    pub quiesce_ms: u64,

    /// Upper bound on a single side effect
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Simulated work duration for the default log handler
    #[serde(default)]
    pub processing_delay_ms: u64,
}

/// Shutdown timeouts
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Bound on stopping the HTTP transport
    #[serde(default = "default_transport_timeout_secs")]
    pub transport_timeout_secs: u64,

    /// Bound on waiting for all workers to exit
    #[serde(default = "default_worker_join_timeout_secs")]
    pub worker_join_timeout_secs: u64,
}

/// API server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Listen address
    #[serde(default = "default_api_host")]
    pub host: IpAddr,

    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write rolling files in addition to the console
    #[serde(default = "default_file_output")]
    pub file_output: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            idle_backoff_ms: default_idle_backoff_ms(),
            cycle_delay_ms: 0,
            quiesce_ms: default_quiesce_ms(),
            handler_timeout_ms: default_handler_timeout_ms(),
            processing_delay_ms: 0,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            transport_timeout_secs: default_transport_timeout_secs(),
            worker_join_timeout_secs: default_worker_join_timeout_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
            file_output: default_file_output(),
        }
    }
}

fn default_capacity() -> usize {
    1000
}

fn default_worker_count() -> usize {
    5
}

fn default_idle_backoff_ms() -> u64 {
    2000
}

fn default_quiesce_ms() -> u64 {
    3000
}

fn default_handler_timeout_ms() -> u64 {
    5000
}

fn default_transport_timeout_secs() -> u64 {
    5
}

fn default_worker_join_timeout_secs() -> u64 {
    10
}

fn default_api_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_output() -> bool {
    true
}

impl WorkerConfig {
    #[inline]
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    #[inline]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    #[inline]
    pub fn quiesce(&self) -> Duration {
        Duration::from_millis(self.quiesce_ms)
    }

    #[inline]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    #[inline]
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl ShutdownConfig {
    #[inline]
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs)
    }

    #[inline]
    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_join_timeout_secs)
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Config {
    /// Load configuration from the file named by `CONFIG_PATH` (or config.toml)
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if the file exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml(&contents)?,
            // File not found - use defaults
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text (no validation)
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1".into()));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid("workers.count must be at least 1".into()));
        }
        if self.workers.idle_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "workers.idle_backoff_ms must be at least 1".into(),
            ));
        }
        if self.workers.handler_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "workers.handler_timeout_ms must be at least 1".into(),
            ));
        }
        if self.workers.quiesce() >= self.shutdown.worker_join_timeout() {
            return Err(ConfigError::Invalid(format!(
                "workers.quiesce_ms ({}) must be shorter than \
                 shutdown.worker_join_timeout_secs ({}s)",
                self.workers.quiesce_ms,
                self.shutdown.worker_join_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::PipelineError {
    fn from(err: ConfigError) -> Self {
        crate::PipelineError::Config(err.to_string())
    }
}
