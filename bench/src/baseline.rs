//! Insert-only baseline.
//!
//! Both catalogs get the same number of entity rows with their foreign keys
//! already resolved before the clock starts, inserted in fixed-size batches
//! inside one transaction per catalog. The two timings differ only in the
//! table written to, so comparing them with the trial timings separates the
//! cost of lookups from the cost of the inserts themselves.

use crate::error::{BenchError, Phase, StorageError};
use crate::model::{Catalog, EntityRecord};
use crate::populate::Workload;
use crate::probe::Clock;
use crate::store::{in_transaction, ReferenceStore};
use crate::strategy::deterministic::DeterministicStrategy;
use crate::strategy::lookup::LookupStrategy;
use crate::strategy::ResolutionStrategy;
use guid_core::statistics::improvement_percent;
use guid_core::Guid;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineResult {
    pub entities: usize,
    pub batch_size: usize,
    pub lookup_catalog_ms: u64,
    pub deterministic_catalog_ms: u64,
    /// Relative difference of the deterministic catalog against the lookup one.
    pub difference_percent: f64,
}

fn storage_err(phase: Phase, strategy: &'static str) -> impl Fn(StorageError) -> BenchError {
    move |source| BenchError::Storage {
        phase,
        strategy,
        trial: None,
        source,
    }
}

pub fn run_insert_baseline(
    store: &mut dyn ReferenceStore,
    clock: &dyn Clock,
    lookup: &LookupStrategy,
    deterministic: &DeterministicStrategy,
    workload: &Workload,
    entities: usize,
    batch_size: usize,
) -> Result<BaselineResult, BenchError> {
    store
        .reset()
        .map_err(storage_err(Phase::Reset, "baseline"))?;
    lookup
        .seed_catalog(store, &workload.catalog)
        .map_err(storage_err(Phase::Seed, lookup.name()))?;
    deterministic
        .seed_catalog(store, &workload.catalog)
        .map_err(storage_err(Phase::Seed, deterministic.name()))?;

    // Resolve everything up front; none of this is timed.
    let lookup_scope = lookup.scope();
    let det_scope = deterministic.scope();
    let created_at = clock.unix_millis();
    let mut lookup_rows = Vec::with_capacity(entities);
    let mut det_rows = Vec::with_capacity(entities);
    for pair in workload.pairs.iter().cycle().take(entities) {
        let admin = store
            .lookup_address(Catalog::Lookup, &lookup_scope.key(&pair.admin_code))
            .map_err(storage_err(Phase::Baseline, lookup.name()))?;
        let reg = store
            .lookup_address(Catalog::Lookup, &lookup_scope.key(&pair.reg_code))
            .map_err(storage_err(Phase::Baseline, lookup.name()))?;
        lookup_rows.push(EntityRecord {
            id: Guid::new_random(),
            tenant_id: lookup_scope.tenant_id,
            site_id: lookup_scope.site_id,
            admin_office_id: admin,
            reg_office_id: reg,
            created_at_utc: created_at,
        });
        det_rows.push(EntityRecord {
            id: Guid::new_random(),
            tenant_id: det_scope.tenant_id,
            site_id: det_scope.site_id,
            admin_office_id: deterministic.id_for_code(&pair.admin_code),
            reg_office_id: deterministic.id_for_code(&pair.reg_code),
            created_at_utc: created_at,
        });
    }

    let lookup_ms = timed_insert(store, clock, Catalog::Lookup, &lookup_rows, batch_size)
        .map_err(storage_err(Phase::Baseline, lookup.name()))?;
    let det_ms = timed_insert(store, clock, Catalog::Deterministic, &det_rows, batch_size)
        .map_err(storage_err(Phase::Baseline, deterministic.name()))?;

    log::info!(
        "insert-only baseline: {} rows in batches of {batch_size}: {lookup_ms} ms vs {det_ms} ms",
        lookup_rows.len()
    );

    Ok(BaselineResult {
        entities: lookup_rows.len(),
        batch_size,
        lookup_catalog_ms: lookup_ms,
        deterministic_catalog_ms: det_ms,
        difference_percent: improvement_percent(lookup_ms as f64, det_ms as f64),
    })
}

fn timed_insert(
    store: &mut dyn ReferenceStore,
    clock: &dyn Clock,
    catalog: Catalog,
    rows: &[EntityRecord],
    batch_size: usize,
) -> Result<u64, StorageError> {
    let start = clock.monotonic();
    in_transaction(store, |store| {
        for chunk in rows.chunks(batch_size.max(1)) {
            store.insert_entities(catalog, chunk)?;
        }
        Ok(())
    })?;
    Ok(clock.monotonic().saturating_sub(start).as_millis() as u64)
}
