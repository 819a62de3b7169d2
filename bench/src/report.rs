//! Report module: aggregates per-strategy trial results, prints the
//! human-readable report and writes the JSON artifact.

use crate::baseline::BaselineResult;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::harness::TrialResult;
use crate::model::Catalog;
use crate::stress::{StressReport, WorkerLine};
use guid_core::statistics::{mean, Statistics};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// All trials of one strategy plus their summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub catalog: Catalog,
    pub trials: Vec<TrialResult>,
    /// Elapsed milliseconds across trials.
    pub elapsed: Statistics,
    pub mean_memory_delta_bytes: f64,
    pub total_lookups: u64,
}

impl StrategySummary {
    pub fn from_trials(
        strategy: &str,
        catalog: Catalog,
        trials: Vec<TrialResult>,
    ) -> Result<Self, BenchError> {
        let elapsed: Vec<f64> = trials.iter().map(|t| t.elapsed_ms as f64).collect();
        let memory: Vec<f64> = trials.iter().map(|t| t.memory_delta_bytes as f64).collect();

        let elapsed = Statistics::from_samples(&elapsed)
            .ok_or_else(|| BenchError::Aggregation(format!("{strategy}: no trials to aggregate")))?;

        Ok(Self {
            strategy: strategy.to_string(),
            catalog,
            elapsed,
            mean_memory_delta_bytes: mean(&memory).unwrap_or(0.0),
            total_lookups: trials.iter().map(|t| t.lookup_count).sum(),
            trials,
        })
    }

    /// Lookups issued by a single trial (identical across trials).
    pub fn lookups_per_trial(&self) -> u64 {
        self.trials.first().map(|t| t.lookup_count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StressSummary {
    pub inserts_per_worker: usize,
    pub succeeded: usize,
    pub mean_elapsed_ms: Option<f64>,
    pub workers: Vec<WorkerLine>,
}

impl From<&StressReport> for StressSummary {
    fn from(report: &StressReport) -> Self {
        Self {
            inserts_per_worker: report.inserts_per_worker,
            succeeded: report.succeeded(),
            mean_elapsed_ms: report.mean_elapsed_ms(),
            workers: report.lines(),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: BenchConfig,
    pub lookup: StrategySummary,
    pub deterministic: StrategySummary,
    /// `(mean lookup - mean deterministic) / mean lookup * 100`.
    pub improvement_percent: f64,
    pub baseline: Option<BaselineResult>,
    pub stress: Option<StressSummary>,
}

fn print_trials(summary: &StrategySummary) {
    println!("\n  Strategy: {} ({} catalog)", summary.strategy, summary.catalog);
    println!("  {}", "-".repeat(60));
    println!(
        "  {:>6} {:>12} {:>12} {:>16}",
        "Trial", "Elapsed (ms)", "Lookups", "Mem delta (B)"
    );
    for t in &summary.trials {
        println!(
            "  {:>6} {:>12} {:>12} {:>+16}",
            t.trial + 1,
            t.elapsed_ms,
            t.lookup_count,
            t.memory_delta_bytes
        );
    }
    let s = &summary.elapsed;
    println!("  Mean:            {:>10.1} ms", s.mean);
    println!("  Min / Max:       {:>10.0} / {:.0} ms", s.min, s.max);
    println!("  Std dev:         {:>10.2} ms", s.std);
    println!(
        "  Mean mem delta:  {:>+10.0} B",
        summary.mean_memory_delta_bytes
    );
    println!("  Total lookups:   {:>10}", summary.total_lookups);
}

/// Print a formatted report comparing both strategies.
pub fn print_report(report: &RunReport) {
    let config = &report.config;
    println!("\n{}", "=".repeat(72));
    println!("  Foreign-key resolution benchmark: DB lookup vs deterministic ids");
    println!(
        "  Target: {} | {} codes | {} entities | {} trials (+{} warmup) | seed {}",
        config.target,
        config.address_count,
        config.entity_count,
        config.trials,
        config.warmup_trials,
        config.seed
    );
    println!("{}", "=".repeat(72));

    print_trials(&report.lookup);
    print_trials(&report.deterministic);

    println!("\n  Comparison Summary:");
    println!(
        "  {:16} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Strategy", "Mean (ms)", "Min (ms)", "Max (ms)", "Std dev", "Lookups/run"
    );
    println!("  {}", "-".repeat(72));
    for s in [&report.lookup, &report.deterministic] {
        println!(
            "  {:16} {:>10.1} {:>10.0} {:>10.0} {:>10.2} {:>12}",
            s.strategy,
            s.elapsed.mean,
            s.elapsed.min,
            s.elapsed.max,
            s.elapsed.std,
            s.lookups_per_trial()
        );
    }
    println!(
        "\n  Deterministic improvement: {:>+.1}%",
        report.improvement_percent
    );

    if let Some(b) = &report.baseline {
        println!(
            "\n  Insert-only baseline ({} rows, batches of {}):",
            b.entities, b.batch_size
        );
        println!("  lookup catalog:        {:>10} ms", b.lookup_catalog_ms);
        println!("  deterministic catalog: {:>10} ms", b.deterministic_catalog_ms);
        println!("  difference:            {:>+10.1}%", b.difference_percent);
    }

    if let Some(stress) = &report.stress {
        println!(
            "\n  Concurrent inserts ({} workers, {} rows each):",
            stress.workers.len(),
            stress.inserts_per_worker
        );
        for w in &stress.workers {
            match (&w.error, w.elapsed_ms) {
                (None, Some(ms)) => println!("  worker {}: {:>10} ms", w.worker + 1, ms),
                (Some(err), _) => println!("  worker {}: FAILED ({err})", w.worker + 1),
                (None, None) => println!("  worker {}: no result", w.worker + 1),
            }
        }
        match stress.mean_elapsed_ms {
            Some(m) => println!(
                "  mean over {} committed workers: {:.1} ms",
                stress.succeeded, m
            ),
            None => println!("  no worker committed"),
        }
    }

    println!(
        "\n  Note: both entity tables share one primary-key shape and locally generated\n  \
         entity ids; the insert-only baseline shows how much of the gap is insert cost."
    );
    println!();
}

pub fn write_json_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
