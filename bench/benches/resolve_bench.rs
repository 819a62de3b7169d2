//! Criterion benchmarks: raw identifier derivation throughput, and one
//! resolve-and-insert batch per strategy on an in-memory SQLite database.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use guid_bench::config::BenchConfig;
use guid_bench::populate::Workload;
use guid_bench::probe::SystemClock;
use guid_bench::store::sqlite::SqliteStore;
use guid_bench::strategy::deterministic::DeterministicStrategy;
use guid_bench::strategy::lookup::LookupStrategy;
use guid_bench::strategy::ResolutionStrategy;
use guid_core::{reference_name, ScopedDeriver};
use std::hint::black_box;
use std::time::Duration;

/// Batch sizes to benchmark.
fn batch_levels() -> Vec<(&'static str, BenchConfig)> {
    let base = BenchConfig::default();
    vec![
        (
            "small",
            BenchConfig {
                address_count: 200,
                entity_count: 1_000,
                ..base.clone()
            },
        ),
        (
            "reference",
            BenchConfig {
                address_count: 2_000,
                entity_count: 10_000,
                ..base
            },
        ),
    ]
}

fn bench_derive(c: &mut Criterion) {
    let config = BenchConfig::default();
    let deriver = config.deriver();
    let mut group = c.benchmark_group("derive");
    group.throughput(Throughput::Elements(1));

    group.bench_function("reference_name", |b| {
        b.iter(|| reference_name(black_box(config.tenant_id), config.site_id, "1999"))
    });
    group.bench_function("id_for", |b| {
        let mut code = 1000u32;
        b.iter(|| {
            code = if code == 2999 { 1000 } else { code + 1 };
            black_box(deriver.id_for(&code.to_string()))
        })
    });
    group.bench_function("scoped_deriver_new", |b| {
        b.iter(|| ScopedDeriver::new(black_box(config.namespace), config.tenant_id, config.site_id))
    });
    group.finish();
}

/// Open an in-memory database and seed the strategy's catalog.
fn setup_store(strategy: &dyn ResolutionStrategy, workload: &Workload) -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().expect("Failed to open in-memory SQLite");
    strategy
        .seed_catalog(&mut store, &workload.catalog)
        .expect("Failed to seed catalog");
    store
}

fn bench_strategy<S: ResolutionStrategy>(
    c: &mut Criterion,
    group_name: &str,
    make: impl Fn(&BenchConfig) -> S,
) {
    let mut group = c.benchmark_group(group_name);
    group.measurement_time(Duration::from_secs(20));
    group.sample_size(20);
    let clock = SystemClock::new();

    for (label, config) in batch_levels() {
        let strategy = make(&config);
        let workload = Workload::generate(&config);
        let mut store = setup_store(&strategy, &workload);

        group.throughput(Throughput::Elements(workload.pairs.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &workload, |b, workload| {
            b.iter(|| {
                strategy
                    .resolve_and_insert_batch(&mut store, &workload.pairs, &clock)
                    .expect("batch failed")
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    bench_strategy(c, "batch/lookup", |config| LookupStrategy::new(config.scope()));
}

fn bench_deterministic(c: &mut Criterion) {
    bench_strategy(c, "batch/deterministic", |config| {
        DeterministicStrategy::new(config.namespace, config.scope())
    });
}

criterion_group!(benches, bench_derive, bench_lookup, bench_deterministic);
criterion_main!(benches);
