//! Compute benchmark worker management
//!
//! Spawns one OS thread per worker so the workload runs on separate cores,
//! collects each worker's result over a oneshot channel and aggregates once
//! every worker has reported. Workers share no state besides the stop flag;
//! the coordinator's wait on all receivers is the only synchronization point.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::bench::workload::run_worker;
use crate::config::ComputeConfig;
use crate::models::{ComputeRun, WorkerResult};
use crate::{BenchError, Result};

/// Starts a worker that sends its result on `result_tx` when done
type SpawnFn = fn(
    usize,
    Duration,
    Arc<AtomicBool>,
    oneshot::Sender<WorkerResult>,
) -> io::Result<JoinHandle<()>>;

/// A spawned worker awaiting completion
struct WorkerInfo {
    id: usize,
    result_rx: oneshot::Receiver<WorkerResult>,
    handle: JoinHandle<()>,
}

/// Coordinator for a multi-worker compute benchmark
pub struct WorkerManager {
    config: ComputeConfig,
    spawn: SpawnFn,
}

impl WorkerManager {
    /// Create a new worker manager
    pub fn new(config: ComputeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            spawn: spawn_thread,
        })
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    /// Run every worker for the configured duration and aggregate
    ///
    /// Elapsed time covers spawning through the last worker reporting. If
    /// any worker cannot be started or fails to report, the whole run fails
    /// and the workers already started are stopped and joined first.
    pub async fn run(&self) -> Result<ComputeRun> {
        let duration = self.config.duration();
        let stop = Arc::new(AtomicBool::new(false));
        info!(
            workers = self.config.worker_count,
            duration_secs = self.config.duration_secs,
            "starting compute benchmark"
        );

        let start = Instant::now();
        let mut workers = Vec::with_capacity(self.config.worker_count);
        let outcome = match self.spawn_workers(duration, &stop, &mut workers) {
            Ok(()) => Self::wait_for_completion(&mut workers).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, started = workers.len(), "stopping compute workers");
                stop.store(true, Ordering::Relaxed);
                Self::join_all(workers);
                return Err(e);
            }
        };
        Self::join_all(workers);

        let run = ComputeRun::new(&self.config, results, elapsed);
        info!(
            total_operations = run.total_operations,
            elapsed_secs = elapsed.as_secs_f64(),
            score = run.score_ops_per_sec,
            "compute benchmark finished"
        );
        Ok(run)
    }

    fn spawn_workers(
        &self,
        duration: Duration,
        stop: &Arc<AtomicBool>,
        workers: &mut Vec<WorkerInfo>,
    ) -> Result<()> {
        for id in 0..self.config.worker_count {
            let (result_tx, result_rx) = oneshot::channel();
            let handle = (self.spawn)(id, duration, stop.clone(), result_tx).map_err(|e| {
                BenchError::ResourceExhausted(format!(
                    "cannot spawn worker {} of {}: {}",
                    id + 1,
                    self.config.worker_count,
                    e
                ))
            })?;
            debug!(worker_id = id, "worker spawned");
            workers.push(WorkerInfo {
                id,
                result_rx,
                handle,
            });
        }

        Ok(())
    }

    /// Barrier: wait for every worker's result
    async fn wait_for_completion(workers: &mut [WorkerInfo]) -> Result<Vec<WorkerResult>> {
        let mut results = Vec::with_capacity(workers.len());

        for worker in workers.iter_mut() {
            let result = (&mut worker.result_rx).await.map_err(|_| {
                BenchError::WorkerError(format!(
                    "worker {} exited without reporting a result",
                    worker.id
                ))
            })?;
            results.push(result);
        }

        Ok(results)
    }

    // Workers see the stop flag within one batch, so this blocks only briefly
    fn join_all(workers: Vec<WorkerInfo>) {
        for worker in workers {
            if worker.handle.join().is_err() {
                warn!(worker_id = worker.id, "worker thread panicked");
            }
        }
    }
}

fn spawn_thread(
    id: usize,
    duration: Duration,
    stop: Arc<AtomicBool>,
    result_tx: oneshot::Sender<WorkerResult>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("hwbench-worker-{}", id))
        .spawn(move || {
            // The coordinator only drops the receiver when the run already failed
            let _ = result_tx.send(run_worker(id, duration, &stop));
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::workload::BATCH_SIZE;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_worker_manager_rejects_invalid_config() {
        let config = ComputeConfig::new().with_worker_count(0);
        assert!(matches!(
            WorkerManager::new(config),
            Err(BenchError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_single_worker_run() {
        let config = ComputeConfig::new()
            .with_duration_secs(0.2)
            .with_worker_count(1);

        let run = WorkerManager::new(config).unwrap().run().await.unwrap();

        assert_eq!(run.worker_count, 1);
        assert_eq!(run.workers.len(), 1);
        assert!(run.total_operations > 0);
        assert_eq!(run.total_operations % BATCH_SIZE, 0);
        assert!(run.actual_elapsed >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_total_is_sum_of_workers() {
        let config = ComputeConfig::new()
            .with_duration_secs(0.1)
            .with_worker_count(3);

        let run = WorkerManager::new(config).unwrap().run().await.unwrap();

        let sum: u64 = run.workers.iter().map(|w| w.operations).sum();
        assert_eq!(run.total_operations, sum);

        let mut ids: Vec<usize> = run.workers.iter().map(|w| w.worker_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2]);

        // Overlapping workers: the run is not the sum of worker times
        let longest = run.workers.iter().map(|w| w.elapsed).max().unwrap();
        assert!(run.actual_elapsed >= longest);
        assert!(run.actual_elapsed < longest * 3);
    }

    #[tokio::test]
    async fn test_spawn_failure_fails_run() {
        fn fail_second(
            id: usize,
            duration: Duration,
            stop: Arc<AtomicBool>,
            tx: oneshot::Sender<WorkerResult>,
        ) -> io::Result<JoinHandle<()>> {
            if id == 1 {
                return Err(io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    "thread limit reached",
                ));
            }
            spawn_thread(id, duration, stop, tx)
        }

        let config = ComputeConfig::new()
            .with_duration_secs(0.05)
            .with_worker_count(4);
        let mut manager = WorkerManager::new(config).unwrap();
        manager.spawn = fail_second;

        match manager.run().await {
            Err(BenchError::ResourceExhausted(msg)) => {
                assert!(msg.contains("worker 2 of 4"));
                assert!(msg.contains("thread limit reached"));
            }
            other => panic!(
                "expected resource exhaustion, got {:?}",
                other.map(|r| r.total_operations)
            ),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_stops_started_workers() {
        static RUNNING: AtomicUsize = AtomicUsize::new(0);

        fn counted_then_fail(
            id: usize,
            duration: Duration,
            stop: Arc<AtomicBool>,
            tx: oneshot::Sender<WorkerResult>,
        ) -> io::Result<JoinHandle<()>> {
            if id == 2 {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no threads left"));
            }
            RUNNING.fetch_add(1, Ordering::SeqCst);
            thread::Builder::new().spawn(move || {
                let _ = tx.send(run_worker(id, duration, &stop));
                RUNNING.fetch_sub(1, Ordering::SeqCst);
            })
        }

        let config = ComputeConfig::new()
            .with_duration_secs(30.0)
            .with_worker_count(4);
        let mut manager = WorkerManager::new(config).unwrap();
        manager.spawn = counted_then_fail;

        let start = Instant::now();
        let err = manager.run().await.unwrap_err();

        assert!(matches!(err, BenchError::ResourceExhausted(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(RUNNING.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_worker_without_result_fails_run() {
        fn vanish(
            _id: usize,
            _duration: Duration,
            _stop: Arc<AtomicBool>,
            tx: oneshot::Sender<WorkerResult>,
        ) -> io::Result<JoinHandle<()>> {
            thread::Builder::new().spawn(move || drop(tx))
        }

        let config = ComputeConfig::new()
            .with_duration_secs(0.05)
            .with_worker_count(2);
        let mut manager = WorkerManager::new(config).unwrap();
        manager.spawn = vanish;

        let err = manager.run().await.unwrap_err();
        assert!(matches!(err, BenchError::WorkerError(_)));
    }

    #[tokio::test]
    async fn test_missing_result_stops_other_workers() {
        static RUNNING: AtomicUsize = AtomicUsize::new(0);

        fn first_vanishes(
            id: usize,
            duration: Duration,
            stop: Arc<AtomicBool>,
            tx: oneshot::Sender<WorkerResult>,
        ) -> io::Result<JoinHandle<()>> {
            if id == 0 {
                return thread::Builder::new().spawn(move || drop(tx));
            }
            RUNNING.fetch_add(1, Ordering::SeqCst);
            thread::Builder::new().spawn(move || {
                let _ = tx.send(run_worker(id, duration, &stop));
                RUNNING.fetch_sub(1, Ordering::SeqCst);
            })
        }

        let config = ComputeConfig::new()
            .with_duration_secs(30.0)
            .with_worker_count(3);
        let mut manager = WorkerManager::new(config).unwrap();
        manager.spawn = first_vanishes;

        let start = Instant::now();
        let err = manager.run().await.unwrap_err();

        assert!(matches!(err, BenchError::WorkerError(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(RUNNING.load(Ordering::SeqCst), 0);
    }
}
