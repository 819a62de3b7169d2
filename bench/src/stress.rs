//! Concurrent-insert stress scenario.
//!
//! A fixed number of workers run in parallel, each with its own store handle
//! and its own transaction. Workers share only read-only configuration; each
//! one generates its own slice of reference pairs from `seed ^ worker`.
//! Outcomes are kept per worker: some may commit while others fail.

use crate::config::BenchConfig;
use crate::error::{error_chain, StorageError};
use crate::populate::reference_pairs;
use crate::probe::Clock;
use crate::store::ReferenceStore;
use crate::strategy::deterministic::DeterministicStrategy;
use crate::strategy::ResolutionStrategy;
use guid_core::statistics::mean;
use serde::Serialize;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("could not open store")]
    Open(#[source] StorageError),
    #[error("batch failed")]
    Insert(#[source] StorageError),
    #[error("worker thread panicked")]
    Panicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerSuccess {
    pub elapsed_ms: u64,
    pub rows: u64,
}

#[derive(Debug)]
pub struct WorkerOutcome {
    pub worker: usize,
    pub result: Result<WorkerSuccess, WorkerError>,
}

/// Serializable per-worker line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerLine {
    pub worker: usize,
    pub elapsed_ms: Option<u64>,
    pub rows: u64,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct StressReport {
    pub inserts_per_worker: usize,
    pub workers: Vec<WorkerOutcome>,
}

impl StressReport {
    pub fn succeeded(&self) -> usize {
        self.workers.iter().filter(|w| w.result.is_ok()).count()
    }

    /// Mean elapsed time over workers that committed.
    pub fn mean_elapsed_ms(&self) -> Option<f64> {
        let samples: Vec<f64> = self
            .workers
            .iter()
            .filter_map(|w| w.result.as_ref().ok())
            .map(|s| s.elapsed_ms as f64)
            .collect();
        mean(&samples)
    }

    pub fn lines(&self) -> Vec<WorkerLine> {
        self.workers
            .iter()
            .map(|w| match &w.result {
                Ok(s) => WorkerLine {
                    worker: w.worker,
                    elapsed_ms: Some(s.elapsed_ms),
                    rows: s.rows,
                    error: None,
                },
                Err(e) => WorkerLine {
                    worker: w.worker,
                    elapsed_ms: None,
                    rows: 0,
                    error: Some(error_chain(e)),
                },
            })
            .collect()
    }
}

/// Run `config.stress_workers` workers, each inserting
/// `config.stress_inserts_per_worker` deterministic-strategy entities in one
/// transaction on a store returned by `open(worker)`.
pub fn run_concurrent_inserts<S, F, C>(config: &BenchConfig, open: F, clock: &C) -> StressReport
where
    S: ReferenceStore,
    F: Fn(usize) -> Result<S, StorageError> + Sync,
    C: Clock + Sync,
{
    let strategy = DeterministicStrategy::new(config.namespace, config.scope());
    let inserts = config.stress_inserts_per_worker;

    let workers = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.stress_workers)
            .map(|worker| {
                let open = &open;
                let strategy = &strategy;
                scope.spawn(move || -> Result<WorkerSuccess, WorkerError> {
                    let pairs = reference_pairs(
                        config.address_count,
                        inserts,
                        config.seed ^ worker as u64,
                    );
                    let mut store = open(worker).map_err(WorkerError::Open)?;
                    let outcome = strategy
                        .resolve_and_insert_batch(&mut store, &pairs, clock)
                        .map_err(WorkerError::Insert)?;
                    Ok(WorkerSuccess {
                        elapsed_ms: outcome.elapsed_ms(),
                        rows: outcome.rows_written,
                    })
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| WorkerOutcome {
                worker,
                result: handle.join().unwrap_or(Err(WorkerError::Panicked)),
            })
            .collect::<Vec<_>>()
    });

    for w in &workers {
        match &w.result {
            Ok(s) => log::debug!("stress worker {}: {} rows in {} ms", w.worker, s.rows, s.elapsed_ms),
            Err(e) => log::warn!("stress worker {} failed: {}", w.worker, error_chain(e)),
        }
    }

    StressReport {
        inserts_per_worker: inserts,
        workers,
    }
}
