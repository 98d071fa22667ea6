//! Sequential storage benchmark
//!
//! Writes one random chunk repeatedly until the configured size is reached,
//! then reads the file back in the same chunk size. Only size matters; the
//! read phase does not compare contents with what was written.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::io::buffer::{allocate_chunk, random_chunk};
use crate::io::disk::{DiskIO, PlatformDiskIO, TestFile};
use crate::models::{Direction, TransferSample};
use crate::util::units::{calculate_throughput_mbps, format_bytes};
use crate::{BenchError, Result};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Progress update sent during a transfer phase
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub direction: Direction,
    /// Bytes processed so far
    pub bytes_processed: u64,
    /// Total bytes to process in this phase
    pub total_bytes: u64,
    /// Current throughput in MB/s
    pub throughput_mbps: f64,
    /// Elapsed time since the phase started
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Calculate completion percentage (0.0 to 1.0)
    pub fn completion_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.bytes_processed as f64 / self.total_bytes as f64).min(1.0)
        }
    }
}

/// Storage benchmark executor
pub struct StorageBenchmark<D: DiskIO = PlatformDiskIO> {
    config: StorageConfig,
    disk_io: D,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
    cancel: Arc<AtomicBool>,
}

impl StorageBenchmark<PlatformDiskIO> {
    /// Create a benchmark against the local filesystem
    pub fn new(config: StorageConfig) -> Result<Self> {
        Self::with_disk_io(config, PlatformDiskIO::new())
    }
}

impl<D: DiskIO> StorageBenchmark<D> {
    /// Create a benchmark using a specific disk I/O implementation
    pub fn with_disk_io(config: StorageConfig, disk_io: D) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            disk_io,
            progress_tx: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Stream progress updates to `tx`
    ///
    /// Updates are dropped rather than waited for when the receiver lags.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Stop the transfer phases when `cancel` is raised
    ///
    /// The flag is checked before every chunk; a raised flag fails the
    /// running phase with `Interrupted`.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn disk_io(&self) -> &D {
        &self.disk_io
    }

    /// Check the target and create the test file
    ///
    /// Nothing is created and no timing starts when this fails.
    pub fn prepare(&self) -> Result<TestFile<'_>> {
        let path = self.config.target_path.as_path();
        self.check_target(path)?;

        let writer = self
            .disk_io
            .open_write(path)
            .map_err(|source| BenchError::TargetUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "created test file");

        Ok(TestFile::new(path.to_path_buf(), &self.disk_io, writer))
    }

    fn check_target(&self, path: &Path) -> Result<()> {
        let unavailable = |reason: &str| BenchError::TargetUnavailable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, reason.to_string()),
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(unavailable("parent directory does not exist"));
        }
        if path.is_dir() {
            return Err(unavailable("target is a directory"));
        }

        let available = self
            .disk_io
            .available_space(parent)
            .map_err(|source| BenchError::TargetUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(available) = available {
            // A file already at the target is truncated, so its space comes back
            let reclaimable = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            let required = self.config.file_size_on_disk();
            if available.saturating_add(reclaimable) < required {
                return Err(BenchError::InsufficientSpace(format!(
                    "{} needed on {}, {} available",
                    format_bytes(required),
                    parent.display(),
                    format_bytes(available.saturating_add(reclaimable))
                )));
            }
        }

        Ok(())
    }

    /// Write phase
    ///
    /// Writes whole chunks until `total_size` is reached, so the file ends
    /// up `total_size` rounded up to a multiple of `chunk_size`. The timer
    /// stops after the file is closed; it is synced first only when
    /// `sync_on_close` is set.
    pub fn write_test(&self, file: &mut TestFile<'_>) -> Result<TransferSample> {
        let total = self.config.total_size;
        let chunk = random_chunk(self.chunk_len()?)?;
        let mut writer = file.take_writer().ok_or_else(|| {
            BenchError::BenchmarkError("write phase already ran for this file".to_string())
        })?;
        let fail = |source| BenchError::TransferFailed {
            phase: Direction::Write,
            source,
        };

        debug!(
            total = %format_bytes(total),
            chunk = %format_bytes(self.config.chunk_size),
            "starting write phase"
        );

        let start = Instant::now();
        let mut written = 0u64;
        let mut last_progress = start;

        while written < total {
            self.check_cancel(Direction::Write)?;
            writer.write_chunk(&chunk).map_err(fail)?;
            written += chunk.len() as u64;
            self.maybe_report(Direction::Write, written, start, &mut last_progress);
        }

        if self.config.sync_on_close {
            writer.sync_all().map_err(fail)?;
        }
        drop(writer);
        let elapsed = start.elapsed();

        file.mark_written();
        self.report(Direction::Write, written, elapsed);

        let sample = TransferSample::new(Direction::Write, total, written, elapsed);
        info!(
            bytes = written,
            elapsed_secs = elapsed.as_secs_f64(),
            throughput_mbps = sample.throughput_mbps,
            "write phase finished"
        );
        Ok(sample)
    }

    /// Read phase
    ///
    /// Requires a completed write phase on `file`. Block contents are discarded.
    pub fn read_test(&self, file: &TestFile<'_>) -> Result<TransferSample> {
        if !file.is_written() {
            return Err(BenchError::BenchmarkError(
                "read phase requires a completed write phase".to_string(),
            ));
        }

        let total = self.config.total_size;
        let mut buffer = allocate_chunk(self.chunk_len()?)?;
        let fail = |source| BenchError::TransferFailed {
            phase: Direction::Read,
            source,
        };

        let mut reader = file.disk_io().open_read(file.path()).map_err(fail)?;
        debug!(path = %file.path().display(), "starting read phase");

        let start = Instant::now();
        let mut read = 0u64;
        let mut last_progress = start;

        while read < total {
            self.check_cancel(Direction::Read)?;
            let n = reader.read_chunk(&mut buffer).map_err(fail)?;
            if n == 0 {
                return Err(BenchError::BenchmarkError(format!(
                    "test file ended after {} of {} bytes",
                    read, total
                )));
            }
            read += n as u64;
            self.maybe_report(Direction::Read, read, start, &mut last_progress);
        }

        drop(reader);
        let elapsed = start.elapsed();
        self.report(Direction::Read, read, elapsed);

        let sample = TransferSample::new(Direction::Read, total, read, elapsed);
        info!(
            bytes = read,
            elapsed_secs = elapsed.as_secs_f64(),
            throughput_mbps = sample.throughput_mbps,
            "read phase finished"
        );
        Ok(sample)
    }

    fn check_cancel(&self, direction: Direction) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(BenchError::Interrupted(direction));
        }
        Ok(())
    }

    fn chunk_len(&self) -> Result<usize> {
        usize::try_from(self.config.chunk_size).map_err(|_| {
            BenchError::ResourceExhausted(format!(
                "chunk size {} does not fit in memory on this platform",
                self.config.chunk_size
            ))
        })
    }

    fn maybe_report(&self, direction: Direction, bytes: u64, start: Instant, last: &mut Instant) {
        if self.progress_tx.is_some() && last.elapsed() >= PROGRESS_INTERVAL {
            self.report(direction, bytes, start.elapsed());
            *last = Instant::now();
        }
    }

    fn report(&self, direction: Direction, bytes: u64, elapsed: Duration) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.try_send(ProgressUpdate {
                direction,
                bytes_processed: bytes,
                total_bytes: self.config.file_size_on_disk(),
                throughput_mbps: calculate_throughput_mbps(bytes, elapsed),
                elapsed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIB;
    use tempfile::tempdir;

    fn small_config(dir: &Path) -> StorageConfig {
        StorageConfig::new(dir.join("testfile.bin"))
            .with_total_size(MIB)
            .with_chunk_size(64 * 1024)
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = tempdir().unwrap();
        let config = small_config(temp_dir.path());
        let path = config.target_path.clone();
        let benchmark = StorageBenchmark::new(config).unwrap();

        let mut file = benchmark.prepare().unwrap();
        let write = benchmark.write_test(&mut file).unwrap();
        assert_eq!(write.direction, Direction::Write);
        assert_eq!(write.bytes_transferred, MIB);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), MIB);

        let read = benchmark.read_test(&file).unwrap();
        assert_eq!(read.direction, Direction::Read);
        assert_eq!(read.bytes_transferred, MIB);
        assert!(read.throughput_mbps > 0.0);

        file.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_read_before_write_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let benchmark = StorageBenchmark::new(small_config(temp_dir.path())).unwrap();

        let file = benchmark.prepare().unwrap();
        let err = benchmark.read_test(&file).unwrap_err();
        assert!(matches!(err, BenchError::BenchmarkError(_)));
    }

    #[test]
    fn test_write_twice_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let benchmark = StorageBenchmark::new(small_config(temp_dir.path())).unwrap();

        let mut file = benchmark.prepare().unwrap();
        benchmark.write_test(&mut file).unwrap();
        assert!(benchmark.write_test(&mut file).is_err());
    }

    #[test]
    fn test_target_is_directory() {
        let temp_dir = tempdir().unwrap();
        let config = StorageConfig::new(temp_dir.path())
            .with_total_size(MIB)
            .with_chunk_size(MIB);
        let benchmark = StorageBenchmark::new(config).unwrap();

        assert!(matches!(
            benchmark.prepare(),
            Err(BenchError::TargetUnavailable { .. })
        ));
    }

    #[test]
    fn test_progress_updates_sent() {
        let temp_dir = tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(100);
        let benchmark = StorageBenchmark::new(small_config(temp_dir.path()))
            .unwrap()
            .with_progress(tx);

        let mut file = benchmark.prepare().unwrap();
        benchmark.write_test(&mut file).unwrap();
        benchmark.read_test(&file).unwrap();
        file.remove().unwrap();
        drop(benchmark);

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }

        let finals: Vec<_> = updates
            .iter()
            .filter(|u| u.completion_percentage() >= 1.0)
            .collect();
        assert!(finals.iter().any(|u| u.direction == Direction::Write));
        assert!(finals.iter().any(|u| u.direction == Direction::Read));
    }

    #[test]
    fn test_cancelled_write_stops_before_first_chunk() {
        let temp_dir = tempdir().unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let benchmark = StorageBenchmark::new(small_config(temp_dir.path()))
            .unwrap()
            .with_cancel(cancel);

        let mut file = benchmark.prepare().unwrap();
        let err = benchmark.write_test(&mut file).unwrap_err();
        assert!(matches!(err, BenchError::Interrupted(Direction::Write)));
        assert!(!file.is_written());
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_progress_update_completion_percentage() {
        let update = ProgressUpdate {
            direction: Direction::Write,
            bytes_processed: 500,
            total_bytes: 1000,
            throughput_mbps: 10.0,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(update.completion_percentage(), 0.5);
    }
}
