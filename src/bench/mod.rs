//! Benchmark engine module
//!
//! The compute workload and its worker coordinator, and the sequential
//! storage benchmark.

pub mod sequential;
pub mod worker;
pub mod workload;

pub use sequential::{ProgressUpdate, StorageBenchmark};
pub use worker::WorkerManager;
pub use workload::{run_worker, BATCH_SIZE};

use crate::config::ComputeConfig;
use crate::models::ComputeRun;
use crate::Result;

/// Run the compute benchmark described by `config`
pub async fn run_benchmark(config: ComputeConfig) -> Result<ComputeRun> {
    WorkerManager::new(config)?.run().await
}
