use super::{BatchOutcome, ResolutionStrategy};
use crate::error::StorageError;
use crate::model::{Catalog, EntityRecord, ReferenceKey, ReferencePair, Scope};
use crate::probe::Clock;
use crate::store::{in_transaction, ReferenceStore};
use guid_core::Guid;

/// Address ids are assigned by the store, so every reference costs a lookup.
pub struct LookupStrategy {
    scope: Scope,
}

impl LookupStrategy {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl ResolutionStrategy for LookupStrategy {
    fn name(&self) -> &'static str {
        "db-lookup"
    }

    fn catalog(&self) -> Catalog {
        Catalog::Lookup
    }

    fn seed_catalog(
        &self,
        store: &mut dyn ReferenceStore,
        entries: &[ReferenceKey],
    ) -> Result<u64, StorageError> {
        in_transaction(store, |store| {
            for key in entries {
                store.insert_address(Catalog::Lookup, None, key)?;
            }
            Ok(entries.len() as u64)
        })
    }

    fn resolve_and_insert_batch(
        &self,
        store: &mut dyn ReferenceStore,
        pairs: &[ReferencePair],
        clock: &dyn Clock,
    ) -> Result<BatchOutcome, StorageError> {
        let mut lookups = 0u64;
        // One key buffer reused for every lookup in the batch.
        let mut key = self.scope.key("");

        let start = clock.monotonic();
        in_transaction(store, |store| {
            for pair in pairs {
                key.business_code.clear();
                key.business_code.push_str(&pair.admin_code);
                let admin_office_id = store.lookup_address(Catalog::Lookup, &key)?;
                lookups += 1;

                key.business_code.clear();
                key.business_code.push_str(&pair.reg_code);
                let reg_office_id = store.lookup_address(Catalog::Lookup, &key)?;
                lookups += 1;

                store.insert_entity(
                    Catalog::Lookup,
                    &EntityRecord {
                        id: Guid::new_random(),
                        tenant_id: self.scope.tenant_id,
                        site_id: self.scope.site_id,
                        admin_office_id,
                        reg_office_id,
                        created_at_utc: clock.unix_millis(),
                    },
                )?;
            }
            Ok(())
        })?;
        let elapsed = clock.monotonic().saturating_sub(start);

        Ok(BatchOutcome {
            elapsed,
            lookup_count: lookups,
            rows_written: pairs.len() as u64,
        })
    }
}
