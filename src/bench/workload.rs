//! Synthetic CPU workload
//!
//! A fixed batch of mixed transcendental floating-point operations. The
//! elapsed-time and stop checks happen only between batches, so `BATCH_SIZE`
//! bounds how far a worker can overrun its duration or a stop request.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::WorkerResult;

/// Operations counted per batch; one expression evaluation each
pub const BATCH_SIZE: u64 = 1000;

/// Evaluate one batch starting at index `base`
///
/// The index keeps growing across batches so no two batches compute the
/// same values.
#[inline]
pub fn run_batch(base: u64) -> f64 {
    let mut acc = 0.0f64;
    for i in base..base + BATCH_SIZE {
        let x = black_box(i as f64);
        acc += x.sqrt() * (x + 1.0).ln().powi(2) / (x.cos() + 1.0000001) + x.tan();
    }
    acc
}

/// Run batches until `duration` has elapsed or `stop` is raised, and report
/// the operation count
pub fn run_worker(worker_id: usize, duration: Duration, stop: &AtomicBool) -> WorkerResult {
    let start = Instant::now();
    let mut batches = 0u64;
    let mut index = 0u64;
    let mut sink = 0.0f64;

    while start.elapsed() < duration && !stop.load(Ordering::Relaxed) {
        sink += run_batch(index);
        index = index.wrapping_add(BATCH_SIZE);
        batches += 1;
    }
    black_box(sink);

    let elapsed = start.elapsed();
    let operations = batches * BATCH_SIZE;
    debug!(
        worker_id,
        batches,
        operations,
        elapsed_secs = elapsed.as_secs_f64(),
        "worker finished"
    );

    WorkerResult {
        worker_id,
        operations,
        batches,
        elapsed,
    }
}
