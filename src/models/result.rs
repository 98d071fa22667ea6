//! Benchmark result data models
//!
//! Measurement records produced by the compute and storage benchmarks.
//! Every record is built once from measured values and never mutated.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ComputeConfig, StorageConfig};
use crate::util::units::{calculate_ops_per_sec, calculate_throughput_mbps};

/// One worker's measured operation count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: usize,
    /// Synthetic arithmetic operations performed
    pub operations: u64,
    /// Workload batches completed
    pub batches: u64,
    /// Time the worker spent in its own loop
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

/// One full multi-worker compute benchmark invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRun {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub requested_duration: Duration,
    pub worker_count: usize,
    /// Wall clock from just before spawning to just after the last join
    #[serde(with = "duration_secs")]
    pub actual_elapsed: Duration,
    pub total_operations: u64,
    pub score_ops_per_sec: f64,
    pub workers: Vec<WorkerResult>,
    pub system_info: SystemInfo,
}

impl ComputeRun {
    /// Aggregate worker results measured over `actual_elapsed`
    pub fn new(
        config: &ComputeConfig,
        workers: Vec<WorkerResult>,
        actual_elapsed: Duration,
    ) -> Self {
        let total_operations = workers.iter().map(|w| w.operations).sum();
        Self {
            timestamp: Utc::now(),
            requested_duration: config.duration(),
            worker_count: workers.len(),
            actual_elapsed,
            total_operations,
            score_ops_per_sec: calculate_ops_per_sec(total_operations, actual_elapsed),
            workers,
            system_info: SystemInfo::detect(),
        }
    }
}

/// Transfer direction of a storage measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    pub fn description(&self) -> &'static str {
        match self {
            Direction::Write => "Write",
            Direction::Read => "Read",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One directional throughput measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSample {
    pub direction: Direction,
    /// Configured transfer size used for the throughput figure
    pub total_bytes: u64,
    /// Bytes actually moved, a whole number of chunks
    pub bytes_transferred: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub throughput_mbps: f64,
}

impl TransferSample {
    pub fn new(
        direction: Direction,
        total_bytes: u64,
        bytes_transferred: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            direction,
            total_bytes,
            bytes_transferred,
            elapsed,
            throughput_mbps: calculate_throughput_mbps(total_bytes, elapsed),
        }
    }

    /// Report line, e.g. `Write speed: 1234.56 MB/s`
    pub fn summary(&self) -> String {
        format!("{} speed: {:.2} MB/s", self.direction, self.throughput_mbps)
    }
}

/// A completed write + read measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRun {
    pub timestamp: DateTime<Utc>,
    pub target_path: PathBuf,
    pub total_size: u64,
    pub chunk_size: u64,
    pub write: TransferSample,
    pub read: TransferSample,
    pub system_info: SystemInfo,
}

impl StorageRun {
    pub fn new(config: &StorageConfig, write: TransferSample, read: TransferSample) -> Self {
        Self {
            timestamp: Utc::now(),
            target_path: config.target_path.clone(),
            total_size: config.total_size,
            chunk_size: config.chunk_size,
            write,
            read,
            system_info: SystemInfo::detect(),
        }
    }
}

/// System information captured at benchmark time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    /// Logical CPUs available to this process, 0 if unknown
    pub logical_cpus: usize,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            logical_cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(0),
        }
    }
}

// Durations are written as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
