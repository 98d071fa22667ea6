use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bench::sequential::{ProgressUpdate, StorageBenchmark};
use crate::bench::worker::WorkerManager;
use crate::config::ComputeConfig;
use crate::error::{self, EXIT_CLEANUP, EXIT_OK};
use crate::io::disk::{DiskIO, TestFile};
use crate::models::{ComputeRun, Direction, StorageRun};
use crate::util::units::{format_rate, format_thousands};
use crate::{BenchError, Result};

/// How results are written to standard output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per field
    #[default]
    Text,
    /// A single pretty-printed JSON document
    Json,
}

/// Run the compute benchmark and print its report
pub async fn run_compute<W: Write>(
    config: ComputeConfig,
    format: OutputFormat,
    show_progress: bool,
    out: &mut W,
) -> Result<ComputeRun> {
    let manager = WorkerManager::new(config)?;

    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!(
            "running {} workers for {} sec",
            manager.config().worker_count,
            manager.config().duration_secs
        ));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = manager.run().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let run = result?;
    write_compute_report(&run, format, out)?;
    Ok(run)
}

/// Write a finished compute run in the requested format
pub fn write_compute_report<W: Write>(
    run: &ComputeRun,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(
                out,
                "Benchmark length requested: {} sec",
                run.requested_duration.as_secs_f64()
            )?;
            writeln!(out, "Workers used: {}", run.worker_count)?;
            writeln!(
                out,
                "Actual elapsed: {:.2} sec",
                run.actual_elapsed.as_secs_f64()
            )?;
            writeln!(out, "Total operations: {}", format_thousands(run.total_operations))?;
            writeln!(out, "Score: {} ops/sec", format_rate(run.score_ops_per_sec))?;
        }
        OutputFormat::Json => write_json(run, out)?,
    }
    Ok(())
}

/// What happened to the test file after the measurement
#[derive(Debug)]
pub enum CleanupStatus {
    /// The file was never created
    NotNeeded,
    Removed(PathBuf),
    Failed(BenchError),
}

/// Measurement result and cleanup result of one storage run, kept apart
/// so a cleanup failure never hides or replaces the measurement
#[derive(Debug)]
pub struct StorageOutcome {
    pub result: Result<StorageRun>,
    pub cleanup: CleanupStatus,
}

impl StorageOutcome {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match (&self.result, &self.cleanup) {
            (Err(e), _) => error::exit_code(e),
            (Ok(_), CleanupStatus::Failed(_)) => EXIT_CLEANUP,
            (Ok(_), _) => EXIT_OK,
        }
    }

    /// Diagnostic lines for standard error, measurement first
    pub fn diagnostics(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Err(e) = &self.result {
            lines.push(format!("error: {}", error::user_friendly_message(e)));
        }
        match &self.cleanup {
            CleanupStatus::Failed(e) => {
                lines.push(format!("error: {}", error::user_friendly_message(e)))
            }
            CleanupStatus::Removed(path) if self.result.is_err() => {
                lines.push(format!("cleanup: removed {}", path.display()))
            }
            _ => {}
        }
        lines
    }
}

/// Run write then read, printing status and result lines as each phase
/// completes
///
/// The read phase only runs after a successful write phase. Once the test
/// file exists its removal is always attempted, whatever happened before.
pub fn run_storage<D: DiskIO, W: Write>(
    benchmark: &StorageBenchmark<D>,
    format: OutputFormat,
    out: &mut W,
) -> StorageOutcome {
    if let Err(e) = status(format, out, "Starting write test...") {
        return StorageOutcome {
            result: Err(e),
            cleanup: CleanupStatus::NotNeeded,
        };
    }

    let mut file = match benchmark.prepare() {
        Ok(file) => file,
        Err(e) => {
            return StorageOutcome {
                result: Err(e),
                cleanup: CleanupStatus::NotNeeded,
            }
        }
    };
    let path = file.path().to_path_buf();

    let result = measure(benchmark, &mut file, format, out);

    let cleanup = match file.remove() {
        Ok(()) => {
            info!(path = %path.display(), "test file removed");
            CleanupStatus::Removed(path)
        }
        Err(e) => {
            tracing::error!(error = %e, "test file cleanup failed");
            CleanupStatus::Failed(e)
        }
    };

    StorageOutcome { result, cleanup }
}

fn measure<D: DiskIO, W: Write>(
    benchmark: &StorageBenchmark<D>,
    file: &mut TestFile<'_>,
    format: OutputFormat,
    out: &mut W,
) -> Result<StorageRun> {
    let write = benchmark.write_test(file)?;
    status(format, out, &write.summary())?;

    status(format, out, "Starting read test...")?;
    let read = benchmark.read_test(file)?;
    status(format, out, &read.summary())?;

    let run = StorageRun::new(benchmark.config(), write, read);
    if format == OutputFormat::Json {
        write_json(&run, out)?;
    }
    Ok(run)
}

fn status<W: Write>(format: OutputFormat, out: &mut W, line: &str) -> Result<()> {
    if format == OutputFormat::Text {
        writeln!(out, "{}", line)?;
        out.flush()?;
    }
    Ok(())
}

fn write_json<T: Serialize, W: Write>(value: &T, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Progress bar for the storage phases plus the task feeding it
pub struct ProgressDisplay {
    pub sender: mpsc::Sender<ProgressUpdate>,
    pub task: JoinHandle<()>,
    bar: ProgressBar,
}

impl ProgressDisplay {
    /// Wrap `inner` so every write first hides the bar and redraws it after
    pub fn writer<W: Write>(&self, inner: W) -> SuspendingWriter<W> {
        SuspendingWriter {
            bar: self.bar.clone(),
            inner,
        }
    }
}

/// Writer that keeps result lines from being drawn over by the bar
pub struct SuspendingWriter<W> {
    bar: ProgressBar,
    inner: W,
}

impl<W: Write> Write for SuspendingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.flush())
    }
}

/// Drive an indicatif bar from storage progress updates
///
/// The bar restarts when the phase changes and finishes when every sender
/// is dropped.
pub fn spawn_progress_display(total_bytes: u64) -> ProgressDisplay {
    display_on(ProgressBar::new(total_bytes))
}

fn display_on(pb: ProgressBar) -> ProgressDisplay {
    let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(100);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} {prefix} {bytes}/{total_bytes} ({eta}) {msg}")
    {
        pb.set_style(style);
    }

    let bar = pb.clone();
    let task = tokio::spawn(async move {
        let mut phase: Option<Direction> = None;
        while let Some(update) = rx.recv().await {
            if phase != Some(update.direction) {
                phase = Some(update.direction);
                pb.reset();
                pb.set_prefix(update.direction.description());
            }
            pb.set_position(update.bytes_processed);
            pb.set_message(format!("{:.1} MB/s", update.throughput_mbps));
        }
        pb.finish_and_clear();
    });

    ProgressDisplay {
        sender: tx,
        task,
        bar,
    }
}
