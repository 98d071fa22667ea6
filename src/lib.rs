//! hwbench - hardware throughput benchmarks
//!
//! Two independent benchmarks: a multi-worker CPU throughput score and a
//! sequential write/read bandwidth measurement against a storage target.

use std::path::PathBuf;

pub mod bench;
pub mod config;
pub mod io;
pub mod models;
pub mod runner;
pub mod util;

use models::Direction;

/// Errors produced by either benchmark
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A worker thread or transfer buffer could not be allocated
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    /// A worker stopped without reporting a result
    #[error("Worker error: {0}")]
    WorkerError(String),
    /// Target path is missing, unmounted or not writable
    #[error("Target unavailable: {}: {source}", path.display())]
    TargetUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Not enough free space on the target volume
    #[error("Insufficient disk space: {0}")]
    InsufficientSpace(String),
    /// A write or read phase failed after the target was opened
    #[error("{phase} phase failed: {source}")]
    TransferFailed {
        phase: Direction,
        #[source]
        source: std::io::Error,
    },
    /// The run was cancelled between chunks
    #[error("Interrupted during the {0} phase")]
    Interrupted(Direction),
    /// The test file could not be removed
    #[error("Cleanup failed for {}: {source}", path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Benchmark execution error
    #[error("Benchmark error: {0}")]
    BenchmarkError(String),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Result serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

/// Result type alias for hwbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error reporting helpers for the command line
pub mod error {
    use super::BenchError;

    /// Exit status for successful runs
    pub const EXIT_OK: u8 = 0;
    /// Exit status for measurement or resource failures
    pub const EXIT_FAILURE: u8 = 1;
    /// Exit status for rejected configuration
    pub const EXIT_CONFIG: u8 = 2;
    /// Exit status when results were produced but the test file was left behind
    pub const EXIT_CLEANUP: u8 = 3;

    /// Map an error to the process exit status
    pub fn exit_code(error: &BenchError) -> u8 {
        match error {
            BenchError::ConfigError(_) => EXIT_CONFIG,
            BenchError::CleanupFailed { .. } => EXIT_CLEANUP,
            _ => EXIT_FAILURE,
        }
    }

    /// Convert error to a single-line message with a hint where one helps
    pub fn user_friendly_message(error: &BenchError) -> String {
        match error {
            BenchError::TargetUnavailable { .. } => {
                format!("{}. Check that the volume is mounted and writable.", error)
            }
            BenchError::InsufficientSpace(_) => {
                format!("{}. Free up space or choose a smaller --size.", error)
            }
            BenchError::ResourceExhausted(_) => {
                format!("{}. Try fewer workers or a smaller chunk size.", error)
            }
            BenchError::CleanupFailed { path, .. } => format!(
                "{}. Remove {} manually.",
                error,
                path.display()
            ),
            _ => error.to_string(),
        }
        .replace('\n', " ")
    }
}

pub const APP_NAME: &str = "hwbench";
pub const CONFIG_FILE: &str = "hwbench.toml";
pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;
