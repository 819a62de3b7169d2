use super::{BatchOutcome, ResolutionStrategy};
use crate::error::StorageError;
use crate::model::{Catalog, EntityRecord, ReferenceKey, ReferencePair, Scope};
use crate::probe::Clock;
use crate::store::{in_transaction, ReferenceStore};
use guid_core::{Guid, ScopedDeriver};

/// Address ids are derived from (namespace, tenant, site, code), so
/// references resolve without touching the store.
pub struct DeterministicStrategy {
    scope: Scope,
    deriver: ScopedDeriver,
}

impl DeterministicStrategy {
    pub fn new(namespace: Guid, scope: Scope) -> Self {
        Self {
            scope,
            deriver: ScopedDeriver::new(namespace, scope.tenant_id, scope.site_id),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Identifier of `business_code` within this strategy's scope.
    pub fn id_for_code(&self, business_code: &str) -> Guid {
        self.deriver.id_for(business_code)
    }
}

impl ResolutionStrategy for DeterministicStrategy {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn catalog(&self) -> Catalog {
        Catalog::Deterministic
    }

    fn seed_catalog(
        &self,
        store: &mut dyn ReferenceStore,
        entries: &[ReferenceKey],
    ) -> Result<u64, StorageError> {
        in_transaction(store, |store| {
            for key in entries {
                // Ids are derived within this scope only.
                if key.tenant_id != self.scope.tenant_id || key.site_id != self.scope.site_id {
                    return Err(StorageError::Constraint {
                        catalog: Catalog::Deterministic,
                        detail: format!("{} is outside the strategy scope", key.business_code),
                    });
                }
                let id = self.id_for_code(&key.business_code);
                store.insert_address(Catalog::Deterministic, Some(id), key)?;
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
        let start = clock.monotonic();
        in_transaction(store, |store| {
            for pair in pairs {
                store.insert_entity(
                    Catalog::Deterministic,
                    &EntityRecord {
                        id: Guid::new_random(),
                        tenant_id: self.scope.tenant_id,
                        site_id: self.scope.site_id,
                        admin_office_id: self.deriver.id_for(&pair.admin_code),
                        reg_office_id: self.deriver.id_for(&pair.reg_code),
                        created_at_utc: clock.unix_millis(),
                    },
                )?;
            }
            Ok(())
        })?;
        let elapsed = clock.monotonic().saturating_sub(start);

        Ok(BatchOutcome {
            elapsed,
            lookup_count: 0,
            rows_written: pairs.len() as u64,
        })
    }
}
