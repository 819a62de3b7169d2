//! Foreign-key resolution strategies and the common `ResolutionStrategy` trait.
//!
//! Two implementations are provided:
//! - [`lookup::LookupStrategy`]: store-assigned address ids, one scalar
//!   lookup per reference at insert time
//! - [`deterministic::DeterministicStrategy`]: name-based ids computed
//!   locally, zero lookups

pub mod deterministic;
pub mod lookup;

use crate::error::StorageError;
use crate::model::{Catalog, ReferenceKey, ReferencePair};
use crate::probe::Clock;
use crate::store::ReferenceStore;
use std::time::Duration;

/// What one timed batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Begin-to-commit wall time.
    pub elapsed: Duration,
    pub lookup_count: u64,
    pub rows_written: u64,
}

impl BatchOutcome {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

pub trait ResolutionStrategy {
    /// Human-readable name for reports.
    fn name(&self) -> &'static str;

    /// Partition this strategy reads and writes.
    fn catalog(&self) -> Catalog;

    /// Insert one address per entry in a single transaction.
    /// Returns the number of records written.
    fn seed_catalog(
        &self,
        store: &mut dyn ReferenceStore,
        entries: &[ReferenceKey],
    ) -> Result<u64, StorageError>;

    /// Resolve both references of every pair and insert one entity per pair,
    /// all inside one transaction. Timed from before `begin` to after `commit`.
    fn resolve_and_insert_batch(
        &self,
        store: &mut dyn ReferenceStore,
        pairs: &[ReferencePair],
        clock: &dyn Clock,
    ) -> Result<BatchOutcome, StorageError>;
}
