//! Benchmark Module for Inference Latency Testing
//!
//! Times the full pipeline (decode, resize, normalize, forward pass, ranking)
//! on one encoded image and summarizes the latency distribution.
//!
//! ## Key Metrics
//!
//! - **Latency**: Time per prediction (ms), with percentiles
//! - **Throughput**: Images classified per second

use std::path::Path;
use std::time::{Duration, Instant};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::inference::predictor::Predictor;
use crate::utils::error::{DefectError, Result};

/// Configuration for benchmarking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of warmup iterations (excluded from measurements)
    pub warmup_iterations: usize,

    /// Number of measured iterations
    pub iterations: usize,

    /// Keep every iteration time in the result
    pub verbose: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 10,
            iterations: 100,
            verbose: false,
        }
    }
}

impl BenchmarkConfig {
    /// Short run for smoke testing
    pub fn quick() -> Self {
        Self {
            warmup_iterations: 2,
            iterations: 10,
            verbose: false,
        }
    }
}

/// Results from a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub latency: LatencyStats,

    /// Images per second
    pub throughput: f64,

    /// Individual iteration times (if verbose)
    pub iteration_times_ms: Vec<f64>,

    pub config: BenchmarkConfig,

    /// Compute backend the pipeline ran on
    pub backend: String,

    /// RFC 3339 time the run finished
    pub timestamp: String,
}

impl BenchmarkResult {
    /// Create a result from raw timings
    pub fn from_timings(timings: Vec<Duration>, config: BenchmarkConfig, backend: &str) -> Self {
        let latency = LatencyStats::from_durations(&timings);
        let throughput = if latency.mean_ms > 0.0 {
            1000.0 / latency.mean_ms
        } else {
            0.0
        };

        let iteration_times_ms = if config.verbose {
            timings.iter().map(|d| d.as_secs_f64() * 1000.0).collect()
        } else {
            Vec::new()
        };

        Self {
            latency,
            throughput,
            iteration_times_ms,
            config,
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// True when the 95th percentile is within `target_ms`
    pub fn meets_latency_target(&self, target_ms: f64) -> bool {
        self.latency.p95_ms <= target_ms
    }

    pub fn summary(&self) -> String {
        format!(
            "Latency: {:.2}ms (mean), {:.2}ms (p95), {:.2}ms (p99) | Throughput: {:.1} img/s",
            self.latency.mean_ms, self.latency.p95_ms, self.latency.p99_ms, self.throughput
        )
    }
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timestamp = self.timestamp.get(..19).unwrap_or(&self.timestamp);

        writeln!(f, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(f, "║              Benchmark Results                               ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Backend:   {:51} ║", self.backend)?;
        writeln!(f, "║ Timestamp: {:51} ║", timestamp)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Latency Statistics                                           ║")?;
        writeln!(f, "║   Mean:     {:8.2} ms                                      ║", self.latency.mean_ms)?;
        writeln!(f, "║   Std Dev:  {:8.2} ms                                      ║", self.latency.std_ms)?;
        writeln!(f, "║   Min:      {:8.2} ms                                      ║", self.latency.min_ms)?;
        writeln!(f, "║   Max:      {:8.2} ms                                      ║", self.latency.max_ms)?;
        writeln!(f, "║   P50:      {:8.2} ms                                      ║", self.latency.p50_ms)?;
        writeln!(f, "║   P95:      {:8.2} ms                                      ║", self.latency.p95_ms)?;
        writeln!(f, "║   P99:      {:8.2} ms                                      ║", self.latency.p99_ms)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Throughput: {:8.1} images/second                          ║", self.throughput)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║   Iterations:   {:5}                                        ║", self.config.iterations)?;
        writeln!(f, "║   Warmup:       {:5}                                        ║", self.config.warmup_iterations)?;
        writeln!(f, "╚══════════════════════════════════════════════════════════════╝")?;
        Ok(())
    }
}

/// Latency statistics from benchmark
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub std_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Median (50th percentile)
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyStats {
    /// Calculate statistics from a list of durations
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut times_ms: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        times_ms.sort_by(|a, b| a.total_cmp(b));

        let n = times_ms.len();
        let mean = times_ms.iter().sum::<f64>() / n as f64;
        let variance = times_ms.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            mean_ms: mean,
            std_ms: variance.sqrt(),
            min_ms: times_ms[0],
            max_ms: times_ms[n - 1],
            p50_ms: percentile(&times_ms, 50.0),
            p95_ms: percentile(&times_ms, 95.0),
            p99_ms: percentile(&times_ms, 99.0),
        }
    }
}

/// Nearest-rank percentile of sorted data
fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_data.len() - 1) as f64).round() as usize;
    sorted_data[idx.min(sorted_data.len() - 1)]
}

/// Time `config.iterations` end-to-end predictions of `bytes`.
///
/// The image is validated by the first warmup pass (or a single untimed pass
/// when there is no warmup), so a bad payload fails before any timing starts.
pub fn run_benchmark<B: Backend>(
    predictor: &Predictor<B>,
    bytes: &[u8],
    config: BenchmarkConfig,
    backend: &str,
) -> Result<BenchmarkResult> {
    if config.iterations == 0 {
        return Err(DefectError::InvalidArgument(
            "benchmark needs at least one iteration".to_string(),
        ));
    }

    info!(
        "Benchmarking {} iterations after {} warmup",
        config.iterations, config.warmup_iterations
    );

    for _ in 0..config.warmup_iterations.max(1) {
        predictor.predict(bytes)?;
    }

    let mut timings = Vec::with_capacity(config.iterations);
    for i in 0..config.iterations {
        let start = Instant::now();
        predictor.predict(bytes)?;
        let elapsed = start.elapsed();
        timings.push(elapsed);

        if config.verbose {
            debug!("iteration {}: {:.2} ms", i + 1, elapsed.as_secs_f64() * 1000.0);
        }
    }

    let result = BenchmarkResult::from_timings(timings, config, backend);
    info!("{}", result.summary());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::predictor::tests::{png, tiny_predictor};

    #[test]
    fn test_latency_stats() {
        let durations: Vec<Duration> = vec![
            Duration::from_millis(10),
            Duration::from_millis(12),
            Duration::from_millis(11),
            Duration::from_millis(15),
            Duration::from_millis(9),
        ];

        let stats = LatencyStats::from_durations(&durations);

        assert!((stats.mean_ms - 11.4).abs() < 0.1);
        assert_eq!(stats.min_ms, 9.0);
        assert_eq!(stats.max_ms, 15.0);
        assert_eq!(stats.p50_ms, 11.0);
        assert_eq!(stats.p99_ms, 15.0);
    }

    #[test]
    fn test_empty_timings_give_zero_stats() {
        let stats = LatencyStats::from_durations(&[]);
        assert_eq!(stats.mean_ms, 0.0);
        assert_eq!(stats.p95_ms, 0.0);
    }

    #[test]
    fn test_meets_latency_target() {
        let timings = vec![
            Duration::from_millis(100),
            Duration::from_millis(120),
            Duration::from_millis(110),
        ];

        let result = BenchmarkResult::from_timings(timings, BenchmarkConfig::default(), "ndarray");

        assert!(result.meets_latency_target(500.0));
        assert!(!result.meets_latency_target(50.0));
        assert!((result.throughput - 1000.0 / 110.0).abs() < 1e-6);
    }

    #[test]
    fn test_result_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("bench.json");

        let config = BenchmarkConfig {
            verbose: true,
            ..BenchmarkConfig::quick()
        };
        let result = BenchmarkResult::from_timings(
            vec![Duration::from_millis(4), Duration::from_millis(6)],
            config,
            "ndarray",
        );
        result.save(&path).unwrap();

        let loaded = BenchmarkResult::load(&path).unwrap();
        assert_eq!(loaded.iteration_times_ms.len(), 2);
        assert_eq!(loaded.backend, "ndarray");
        assert!(loaded.to_string().contains("Benchmark Results"));
    }

    #[test]
    fn test_run_benchmark_on_pipeline() {
        let predictor = tiny_predictor(8);
        let config = BenchmarkConfig {
            warmup_iterations: 1,
            iterations: 3,
            verbose: true,
        };

        let result =
            run_benchmark(&predictor, &png(64, 64, [50, 50, 50]), config, "ndarray").unwrap();
        assert_eq!(result.iteration_times_ms.len(), 3);
        assert!(result.latency.min_ms <= result.latency.max_ms);
        assert!(result.throughput > 0.0);
    }

    #[test]
    fn test_run_benchmark_rejects_bad_input() {
        let predictor = tiny_predictor(8);

        assert!(matches!(
            run_benchmark(&predictor, b"nope", BenchmarkConfig::quick(), "ndarray"),
            Err(DefectError::Decode(_))
        ));

        let no_iterations = BenchmarkConfig {
            iterations: 0,
            ..BenchmarkConfig::quick()
        };
        assert!(matches!(
            run_benchmark(&predictor, &png(8, 8, [0, 0, 0]), no_iterations, "ndarray"),
            Err(DefectError::InvalidArgument(_))
        ));
    }
}
