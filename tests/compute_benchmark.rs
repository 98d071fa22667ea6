use std::time::Duration;

use hwbench::bench::{run_benchmark, BATCH_SIZE};
use hwbench::config::ComputeConfig;
use hwbench::runner::{run_compute, OutputFormat};
use hwbench::util::units::calculate_ops_per_sec;

#[tokio::test]
async fn test_two_workers_one_second() {
    let config = ComputeConfig::new()
        .with_duration_secs(1.0)
        .with_worker_count(2);

    let run = run_benchmark(config).await.expect("compute run");

    assert_eq!(run.worker_count, 2);
    assert!(run.total_operations > 0);
    assert_eq!(run.total_operations % BATCH_SIZE, 0);

    let elapsed = run.actual_elapsed.as_secs_f64();
    assert!(elapsed >= 1.0, "elapsed {} shorter than requested", elapsed);
    assert!(elapsed < 1.5, "elapsed {} overshoots", elapsed);

    let expected = calculate_ops_per_sec(run.total_operations, run.actual_elapsed);
    assert!((run.score_ops_per_sec - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_worker_count_sweep_is_monotonic() {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut previous: Option<(usize, u64)> = None;
    for workers in [1usize, 2, 4, 8] {
        let run = run_benchmark(
            ComputeConfig::new()
                .with_duration_secs(0.3)
                .with_worker_count(workers),
        )
        .await
        .unwrap();
        assert_eq!(run.worker_count, workers);

        if let Some((prev_workers, prev_total)) = previous {
            // Expected gain from extra cores, with slack for other tests sharing them;
            // past the core count the total should only hold steady
            let gain = workers.min(cores) as f64 / prev_workers.min(cores) as f64;
            let factor = (gain * 0.4).max(0.6);
            assert!(
                run.total_operations as f64 >= prev_total as f64 * factor,
                "{} workers: {} ops, {} workers: {} ops ({} cores)",
                workers,
                run.total_operations,
                prev_workers,
                prev_total,
                cores
            );
        }
        previous = Some((workers, run.total_operations));
    }
}

#[tokio::test]
#[ignore = "timing sensitive; run on an idle machine"]
async fn test_single_worker_score_is_stable() {
    let config = ComputeConfig::new()
        .with_duration_secs(2.0)
        .with_worker_count(1);

    let first = run_benchmark(config.clone()).await.unwrap();
    let second = run_benchmark(config).await.unwrap();

    let ratio = first.score_ops_per_sec / second.score_ops_per_sec;
    assert!((0.8..=1.2).contains(&ratio), "scores differ by ratio {}", ratio);
}

#[tokio::test]
async fn test_text_report_lines() {
    let config = ComputeConfig::new()
        .with_duration_secs(0.2)
        .with_worker_count(2);

    let mut out = Vec::new();
    let run = run_compute(config, OutputFormat::Text, false, &mut out)
        .await
        .unwrap();
    assert!(run.actual_elapsed >= Duration::from_millis(200));

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "Benchmark length requested: 0.2 sec");
    assert_eq!(lines[1], "Workers used: 2");
    assert!(lines[2].starts_with("Actual elapsed: "));
    assert!(lines[3].starts_with("Total operations: "));
    assert!(lines[4].starts_with("Score: ") && lines[4].ends_with(" ops/sec"));
}

#[tokio::test]
async fn test_invalid_config_never_spawns() {
    let config = ComputeConfig::new().with_worker_count(0);
    let mut out = Vec::new();
    let err = run_compute(config, OutputFormat::Text, false, &mut out)
        .await
        .unwrap_err();
    assert_eq!(hwbench::error::exit_code(&err), hwbench::error::EXIT_CONFIG);
    assert!(out.is_empty());
}
