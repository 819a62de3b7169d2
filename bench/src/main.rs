//! Standalone benchmark runner that prints the formatted report.
//!
//! No arguments. Workload size, trial count, seed and storage target come
//! from `BenchConfig` defaults, overridable through `GUID_BENCH_*` variables
//! (or a `.env` file):
//!
//!   cargo run --release -p guid-bench
//!   GUID_BENCH_DB=/tmp/guid-bench.db GUID_BENCH_TRIALS=10 cargo run --release -p guid-bench

use anyhow::Context;
use guid_bench::config::{BenchConfig, StorageTarget};
use guid_bench::harness::BenchmarkHarness;
use guid_bench::probe::{ProcessMemory, SystemClock};
use guid_bench::report::{print_report, write_json_report, StressSummary};
use guid_bench::store::sqlite::SqliteStore;
use guid_bench::store::ReferenceStore;
use guid_bench::stress::{run_concurrent_inserts, StressReport};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process;

fn log_level_from_env() -> LevelFilter {
    std::env::var("GUID_BENCH_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// The stress workers need a database several connections can share, so an
/// in-memory target is swapped for a scratch file that is removed afterwards.
fn stress_database(config: &BenchConfig) -> (PathBuf, bool) {
    match &config.target {
        StorageTarget::File(path) => (path.clone(), false),
        StorageTarget::InMemory => (
            std::env::temp_dir().join(format!("guid-bench-stress-{}.db", process::id())),
            true,
        ),
    }
}

fn remove_scratch_database(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut p = path.as_os_str().to_owned();
        p.push(suffix);
        if let Err(e) = std::fs::remove_file(&p) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {e}", Path::new(&p).display());
            }
        }
    }
}

fn run_stress(config: &BenchConfig, clock: &SystemClock) -> anyhow::Result<StressReport> {
    let (path, scratch) = stress_database(config);
    let target = StorageTarget::File(path.clone());

    // Start from empty tables; this handle is dropped before workers connect.
    SqliteStore::open(&target)
        .and_then(|mut store| store.reset())
        .with_context(|| format!("preparing stress database {}", path.display()))?;

    log::info!(
        "stress: {} workers x {} inserts on {}",
        config.stress_workers,
        config.stress_inserts_per_worker,
        path.display()
    );
    let report = run_concurrent_inserts(config, |_worker| SqliteStore::open(&target), clock);

    if scratch {
        remove_scratch_database(&path);
    }
    Ok(report)
}

fn run() -> anyhow::Result<()> {
    let config = BenchConfig::from_env().context("loading configuration")?;

    println!("Running foreign-key resolution benchmark...");
    println!("  Storage target: {}", config.target);
    println!("  Trials:         {} (+{} warmup)", config.trials, config.warmup_trials);
    println!(
        "  Workload:       {} codes, {} entities, seed {}",
        config.address_count, config.entity_count, config.seed
    );

    let store = SqliteStore::open_target(&config.target)?;

    let clock = SystemClock::new();
    let mut harness =
        BenchmarkHarness::new(config.clone(), store, SystemClock::new(), ProcessMemory::new())?;
    let mut report = harness.run()?;
    drop(harness);

    if config.stress_workers > 0 {
        let stress = run_stress(&config, &clock)?;
        report.stress = Some(StressSummary::from(&stress));
    }

    print_report(&report);

    if let Some(path) = &config.json_report {
        write_json_report(&report, path)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        println!("  JSON report written to {}", path.display());
    }

    Ok(())
}

fn main() {
    let log_file = std::env::var("GUID_BENCH_LOG_FILE").ok();
    if let Err(e) = guid_core::initialize_logger(log_level_from_env(), log_file.as_deref()) {
        eprintln!("Failed to initialize logger: {e:#}. Exiting.");
        process::exit(1);
    }

    if let Err(e) = run() {
        log::error!("benchmark aborted: {e:#}");
        process::exit(1);
    }
}
