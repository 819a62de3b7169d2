//! Benchmark harness: runs both strategies over one fixed workload for a fixed
//! number of isolated trials and aggregates the timings.
//!
//! Per trial: reset both catalogs, seed both catalogs, then run each
//! strategy's timed batch once, sampling process memory around it. Trials and
//! strategies run strictly one after another on a single connection. Any
//! storage error aborts the whole run; nothing is aggregated from a partial
//! trial set.

use crate::baseline::{run_insert_baseline, BaselineResult};
use crate::config::BenchConfig;
use crate::error::{BenchError, Phase};
use crate::model::Catalog;
use crate::populate::Workload;
use crate::probe::{Clock, MemorySampler};
use crate::report::{RunReport, StrategySummary};
use crate::store::ReferenceStore;
use crate::strategy::deterministic::DeterministicStrategy;
use crate::strategy::lookup::LookupStrategy;
use crate::strategy::ResolutionStrategy;
use guid_core::statistics::improvement_percent;
use serde::Serialize;

/// One strategy's measurement in one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialResult {
    pub trial: usize,
    pub elapsed_ms: u64,
    pub lookup_count: u64,
    pub memory_delta_bytes: i64,
    pub rows_written: u64,
}

pub struct BenchmarkHarness<S, C, M> {
    config: BenchConfig,
    store: S,
    clock: C,
    memory: M,
    lookup: LookupStrategy,
    deterministic: DeterministicStrategy,
}

impl<S, C, M> BenchmarkHarness<S, C, M>
where
    S: ReferenceStore,
    C: Clock,
    M: MemorySampler,
{
    pub fn new(config: BenchConfig, store: S, clock: C, memory: M) -> Result<Self, BenchError> {
        config.validate()?;
        let scope = config.scope();
        Ok(Self {
            lookup: LookupStrategy::new(scope),
            deterministic: DeterministicStrategy::new(config.namespace, scope),
            config,
            store,
            clock,
            memory,
        })
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Warmup, all measured trials, the insert-only baseline, then aggregation.
    pub fn run(&mut self) -> Result<RunReport, BenchError> {
        let workload = Workload::generate(&self.config);
        log::info!(
            "workload: {} address codes, {} entities, seed {}",
            workload.catalog.len(),
            workload.pairs.len(),
            self.config.seed
        );

        for w in 0..self.config.warmup_trials {
            log::debug!("warmup iteration {}", w + 1);
            self.run_trial(w, &workload, Phase::Warmup)?;
        }

        let mut lookup_trials = Vec::with_capacity(self.config.trials);
        let mut deterministic_trials = Vec::with_capacity(self.config.trials);
        for trial in 0..self.config.trials {
            let [lookup, deterministic] =
                self.run_trial(trial, &workload, Phase::TimedExecution)?;
            log::info!(
                "trial {}/{}: {} {} ms ({} lookups) | {} {} ms ({} lookups)",
                trial + 1,
                self.config.trials,
                self.lookup.name(),
                lookup.elapsed_ms,
                lookup.lookup_count,
                self.deterministic.name(),
                deterministic.elapsed_ms,
                deterministic.lookup_count
            );
            lookup_trials.push(lookup);
            deterministic_trials.push(deterministic);
        }

        let baseline = self.run_baseline(&workload)?;
        self.aggregate(lookup_trials, deterministic_trials, baseline)
    }

    /// Reset, seed, and time both strategies once. Returns
    /// `[lookup, deterministic]`.
    pub fn run_trial(
        &mut self,
        trial: usize,
        workload: &Workload,
        phase: Phase,
    ) -> Result<[TrialResult; 2], BenchError> {
        // Any failure inside a warmup iteration is reported as warmup.
        let step = |p: Phase| if phase == Phase::Warmup { Phase::Warmup } else { p };

        self.store
            .reset()
            .map_err(|source| BenchError::Storage {
                phase: step(Phase::Reset),
                strategy: "all",
                trial: Some(trial),
                source,
            })?;
        log::debug!("{phase} iteration {trial}: catalogs reset");

        for strategy in [
            &self.lookup as &dyn ResolutionStrategy,
            &self.deterministic as &dyn ResolutionStrategy,
        ] {
            let written = strategy
                .seed_catalog(&mut self.store, &workload.catalog)
                .map_err(|source| BenchError::Storage {
                    phase: step(Phase::Seed),
                    strategy: strategy.name(),
                    trial: Some(trial),
                    source,
                })?;
            log::debug!("seeded {written} {} addresses", strategy.catalog());
        }

        let lookup = time_strategy(
            &self.lookup,
            &mut self.store,
            &self.clock,
            &mut self.memory,
            workload,
            trial,
            phase,
        )?;
        let deterministic = time_strategy(
            &self.deterministic,
            &mut self.store,
            &self.clock,
            &mut self.memory,
            workload,
            trial,
            phase,
        )?;
        Ok([lookup, deterministic])
    }

    fn run_baseline(&mut self, workload: &Workload) -> Result<Option<BaselineResult>, BenchError> {
        if self.config.baseline_entities == 0 {
            return Ok(None);
        }
        let result = run_insert_baseline(
            &mut self.store,
            &self.clock,
            &self.lookup,
            &self.deterministic,
            workload,
            self.config.baseline_entities,
            self.config.baseline_batch_size,
        )?;
        Ok(Some(result))
    }

    fn aggregate(
        &self,
        lookup_trials: Vec<TrialResult>,
        deterministic_trials: Vec<TrialResult>,
        baseline: Option<BaselineResult>,
    ) -> Result<RunReport, BenchError> {
        for trials in [&lookup_trials, &deterministic_trials] {
            if trials.len() != self.config.trials {
                return Err(BenchError::Aggregation(format!(
                    "expected {} trials, have {}",
                    self.config.trials,
                    trials.len()
                )));
            }
        }

        let lookup =
            StrategySummary::from_trials(self.lookup.name(), Catalog::Lookup, lookup_trials)?;
        let deterministic = StrategySummary::from_trials(
            self.deterministic.name(),
            Catalog::Deterministic,
            deterministic_trials,
        )?;
        let improvement = improvement_percent(lookup.elapsed.mean, deterministic.elapsed.mean);
        log::info!("aggregate: deterministic improvement {improvement:.1}%");

        Ok(RunReport {
            config: self.config.clone(),
            lookup,
            deterministic,
            improvement_percent: improvement,
            baseline,
            stress: None,
        })
    }
}

/// Time one strategy's batch over the full workload, sampling memory around it.
fn time_strategy(
    strategy: &dyn ResolutionStrategy,
    store: &mut dyn ReferenceStore,
    clock: &dyn Clock,
    memory: &mut dyn MemorySampler,
    workload: &Workload,
    trial: usize,
    phase: Phase,
) -> Result<TrialResult, BenchError> {
    let before = memory.resident_bytes();
    let outcome = strategy
        .resolve_and_insert_batch(store, &workload.pairs, clock)
        .map_err(|source| BenchError::Storage {
            phase,
            strategy: strategy.name(),
            trial: Some(trial),
            source,
        })?;
    let after = memory.resident_bytes();

    Ok(TrialResult {
        trial,
        elapsed_ms: outcome.elapsed_ms(),
        lookup_count: outcome.lookup_count,
        memory_delta_bytes: after as i64 - before as i64,
        rows_written: outcome.rows_written,
    })
}
