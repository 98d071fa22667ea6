use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hwbench::bench::StorageBenchmark;
use hwbench::config::Settings;
use hwbench::error;
use hwbench::runner::{self, OutputFormat, ProgressDisplay};
use hwbench::util::units::parse_bytes;
use hwbench::{BenchError, Result};

#[derive(Parser)]
#[command(name = "hwbench")]
#[command(about = "CPU throughput and storage sequential I/O benchmarks", long_about = None)]
struct Cli {
    /// Settings file (defaults to $CONFIG_DIR/hwbench/hwbench.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Result output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Hide progress indicators
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the multi-worker CPU throughput benchmark
    Cpu {
        /// Per-worker benchmark length in seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Number of parallel workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Measure sequential write and read bandwidth of a storage target
    #[command(alias = "ssd")]
    Storage {
        /// Test file to create on the device under test
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Total file size, e.g. 2GiB
        #[arg(short, long, value_parser = parse_bytes)]
        size: Option<u64>,

        /// Size of each write/read call, e.g. 4MiB
        #[arg(short, long, value_parser = parse_bytes)]
        chunk: Option<u64>,

        /// Sync file data to the device before stopping the write timer
        #[arg(long)]
        sync: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", error::user_friendly_message(&e));
            error::exit_code(&e)
        }
    };
    ExitCode::from(code)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    let show_progress = !cli.quiet;

    match cli.command {
        Commands::Cpu { duration, workers } => {
            let mut config = settings.compute;
            if let Some(secs) = duration {
                config = config.with_duration_secs(secs);
            }
            if let Some(count) = workers {
                config = config.with_worker_count(count);
            }

            let mut stdout = std::io::stdout();
            runner::run_compute(config, cli.format, show_progress, &mut stdout).await?;
            Ok(error::EXIT_OK)
        }
        Commands::Storage {
            target,
            size,
            chunk,
            sync,
        } => {
            let mut storage = settings.storage;
            if target.is_some() {
                storage.target_path = target;
            }
            if let Some(size) = size {
                storage.total_size = size;
            }
            if let Some(chunk) = chunk {
                storage.chunk_size = chunk;
            }
            storage.sync_on_close |= sync;
            let config = storage.into_config()?;

            // Ctrl-C stops the transfer at the next chunk so the test file is
            // still removed through the normal cleanup path
            let cancel = Arc::new(AtomicBool::new(false));
            let interrupt = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, stopping after the current chunk");
                        cancel.store(true, Ordering::Relaxed);
                    }
                })
            };

            let mut benchmark = StorageBenchmark::new(config)?.with_cancel(cancel);
            let display = if show_progress {
                let display =
                    runner::spawn_progress_display(benchmark.config().file_size_on_disk());
                benchmark = benchmark.with_progress(display.sender.clone());
                Some(display)
            } else {
                None
            };

            let format = cli.format;
            let (stdout, progress) = match display {
                Some(display) => {
                    let stdout: Box<dyn Write + Send> =
                        Box::new(display.writer(std::io::stdout()));
                    let ProgressDisplay { sender, task, .. } = display;
                    drop(sender);
                    (stdout, Some(task))
                }
                None => (Box::new(std::io::stdout()) as Box<dyn Write + Send>, None),
            };

            let outcome = tokio::task::spawn_blocking(move || {
                let mut stdout = stdout;
                runner::run_storage(&benchmark, format, &mut stdout)
            })
            .await
            .map_err(|e| {
                BenchError::BenchmarkError(format!("storage benchmark task failed: {}", e))
            })?;
            interrupt.abort();

            // The benchmark and its progress sender are gone; let the bar finish
            if let Some(task) = progress {
                let _ = task.await;
            }

            for line in outcome.diagnostics() {
                eprintln!("{}", line);
            }
            Ok(outcome.exit_code())
        }
    }
}
