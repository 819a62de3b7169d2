//! In-process store used by tests and the stress scenario's fake runs.
//!
//! A [`MemoryDatabase`] holds committed rows behind a mutex. Each
//! [`MemoryStore`] handle is one "connection": it stages writes made inside
//! its open transaction and applies them under the lock on commit, after
//! re-checking the uniqueness constraints against rows committed meanwhile.

use super::ReferenceStore;
use crate::error::StorageError;
use crate::model::{AddressRecord, Catalog, EntityRecord, ReferenceKey, ResolvedEntity};
use guid_core::Guid;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct CatalogTables {
    addresses: Vec<AddressRecord>,
    by_key: HashMap<ReferenceKey, Guid>,
    codes_by_id: HashMap<Guid, String>,
    entities: Vec<EntityRecord>,
    entity_ids: HashSet<Guid>,
}

impl CatalogTables {
    fn push_address(&mut self, record: AddressRecord) {
        self.by_key.insert(record.key.clone(), record.id);
        self.codes_by_id
            .insert(record.id, record.key.business_code.clone());
        self.addresses.push(record);
    }

    fn push_entity(&mut self, entity: EntityRecord) {
        self.entity_ids.insert(entity.id);
        self.entities.push(entity);
    }

    fn clear(&mut self) {
        *self = CatalogTables::default();
    }
}

#[derive(Debug, Default)]
struct Tables {
    lookup: CatalogTables,
    deterministic: CatalogTables,
}

impl Tables {
    fn catalog(&self, catalog: Catalog) -> &CatalogTables {
        match catalog {
            Catalog::Lookup => &self.lookup,
            Catalog::Deterministic => &self.deterministic,
        }
    }

    fn catalog_mut(&mut self, catalog: Catalog) -> &mut CatalogTables {
        match catalog {
            Catalog::Lookup => &mut self.lookup,
            Catalog::Deterministic => &mut self.deterministic,
        }
    }
}

/// Shared committed state. Clone to hand the same database to more handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new handle with its own transaction state.
    pub fn connect(&self) -> MemoryStore {
        MemoryStore {
            db: self.clone(),
            pending: None,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Transaction("memory database lock poisoned".into()))
    }
}

#[derive(Debug)]
enum Write {
    Address(Catalog, AddressRecord),
    Entity(Catalog, EntityRecord),
}

/// Writes staged by an open transaction, indexed for read-your-writes.
#[derive(Debug, Default)]
struct Pending {
    writes: Vec<Write>,
    staged: Tables,
}

pub struct MemoryStore {
    db: MemoryDatabase,
    pending: Option<Pending>,
}

impl MemoryStore {
    /// A store over a fresh, private database.
    pub fn new() -> Self {
        MemoryDatabase::new().connect()
    }

    fn check_address(
        tables: &Tables,
        staged: Option<&Tables>,
        catalog: Catalog,
        record: &AddressRecord,
    ) -> Result<(), StorageError> {
        let sources = std::iter::once(tables.catalog(catalog))
            .chain(staged.map(|s| s.catalog(catalog)));
        for t in sources {
            if t.by_key.contains_key(&record.key) {
                return Err(StorageError::Constraint {
                    catalog,
                    detail: format!(
                        "duplicate natural key ({}, {}, {})",
                        record.key.tenant_id, record.key.site_id, record.key.business_code
                    ),
                });
            }
            if t.codes_by_id.contains_key(&record.id) {
                return Err(StorageError::Constraint {
                    catalog,
                    detail: format!("duplicate address id {}", record.id),
                });
            }
        }
        Ok(())
    }

    fn check_entity(
        tables: &Tables,
        staged: Option<&Tables>,
        catalog: Catalog,
        entity: &EntityRecord,
    ) -> Result<(), StorageError> {
        let duplicate = tables.catalog(catalog).entity_ids.contains(&entity.id)
            || staged.is_some_and(|s| s.catalog(catalog).entity_ids.contains(&entity.id));
        if duplicate {
            return Err(StorageError::Constraint {
                catalog,
                detail: format!("duplicate entity id {}", entity.id),
            });
        }
        Ok(())
    }

    fn write(&mut self, write: Write) -> Result<(), StorageError> {
        let db = self.db.clone();
        let mut tables = db.lock()?;
        let staged = self.pending.as_ref().map(|p| &p.staged);

        match &write {
            Write::Address(catalog, record) => {
                Self::check_address(&tables, staged, *catalog, record)?
            }
            Write::Entity(catalog, entity) => Self::check_entity(&tables, staged, *catalog, entity)?,
        }

        match self.pending.as_mut() {
            Some(pending) => {
                match &write {
                    Write::Address(c, r) => pending.staged.catalog_mut(*c).push_address(r.clone()),
                    Write::Entity(c, e) => pending.staged.catalog_mut(*c).push_entity(*e),
                }
                pending.writes.push(write);
            }
            // Autocommit.
            None => apply(&mut tables, write),
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(tables: &mut Tables, write: Write) {
    match write {
        Write::Address(c, r) => tables.catalog_mut(c).push_address(r),
        Write::Entity(c, e) => tables.catalog_mut(c).push_entity(e),
    }
}

impl ReferenceStore for MemoryStore {
    fn begin(&mut self) -> Result<(), StorageError> {
        if self.pending.is_some() {
            return Err(StorageError::Transaction(
                "begin called while a transaction is open".into(),
            ));
        }
        self.pending = Some(Pending::default());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let pending = self.pending.take().ok_or_else(|| {
            StorageError::Transaction("commit called without an open transaction".into())
        })?;
        let mut tables = self.db.lock()?;

        // Other handles may have committed conflicting rows since staging.
        for write in &pending.writes {
            match write {
                Write::Address(c, r) => Self::check_address(&tables, None, *c, r)?,
                Write::Entity(c, e) => Self::check_entity(&tables, None, *c, e)?,
            }
        }
        for write in pending.writes {
            apply(&mut tables, write);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.pending = None;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        let mut tables = self.db.lock()?;
        tables.lookup.clear();
        tables.deterministic.clear();
        Ok(())
    }

    fn insert_address(
        &mut self,
        catalog: Catalog,
        id: Option<Guid>,
        key: &ReferenceKey,
    ) -> Result<Guid, StorageError> {
        let id = id.unwrap_or_else(Guid::new_random);
        self.write(Write::Address(
            catalog,
            AddressRecord {
                id,
                key: key.clone(),
            },
        ))?;
        Ok(id)
    }

    fn lookup_address(
        &mut self,
        catalog: Catalog,
        key: &ReferenceKey,
    ) -> Result<Guid, StorageError> {
        if let Some(id) = self
            .pending
            .as_ref()
            .and_then(|p| p.staged.catalog(catalog).by_key.get(key))
        {
            return Ok(*id);
        }
        let tables = self.db.lock()?;
        tables
            .catalog(catalog)
            .by_key
            .get(key)
            .copied()
            .ok_or_else(|| StorageError::NotFound {
                catalog,
                code: key.business_code.clone(),
            })
    }

    fn insert_entity(
        &mut self,
        catalog: Catalog,
        entity: &EntityRecord,
    ) -> Result<(), StorageError> {
        self.write(Write::Entity(catalog, *entity))
    }

    fn resolved_entities(&mut self, catalog: Catalog) -> Result<Vec<ResolvedEntity>, StorageError> {
        let tables = self.db.lock()?;
        let t = tables.catalog(catalog);
        Ok(t.entities
            .iter()
            .map(|e| ResolvedEntity {
                entity_id: e.id,
                admin_code: t.codes_by_id.get(&e.admin_office_id).cloned(),
                reg_code: t.codes_by_id.get(&e.reg_office_id).cloned(),
            })
            .collect())
    }

    fn count_addresses(&mut self, catalog: Catalog) -> Result<u64, StorageError> {
        Ok(self.db.lock()?.catalog(catalog).addresses.len() as u64)
    }

    fn count_entities(&mut self, catalog: Catalog) -> Result<u64, StorageError> {
        Ok(self.db.lock()?.catalog(catalog).entities.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scope;

    fn scope() -> Scope {
        Scope {
            tenant_id: Guid::from_native_bytes([1; 16]),
            site_id: Guid::from_native_bytes([2; 16]),
        }
    }

    #[test]
    fn staged_writes_are_invisible_to_other_handles_until_commit() {
        let db = MemoryDatabase::new();
        let mut writer = db.connect();
        let mut reader = db.connect();

        writer.begin().unwrap();
        let id = writer
            .insert_address(Catalog::Lookup, None, &scope().key("1000"))
            .unwrap();
        assert_eq!(
            writer
                .lookup_address(Catalog::Lookup, &scope().key("1000"))
                .unwrap(),
            id
        );
        assert!(reader
            .lookup_address(Catalog::Lookup, &scope().key("1000"))
            .is_err());

        writer.commit().unwrap();
        assert_eq!(
            reader
                .lookup_address(Catalog::Lookup, &scope().key("1000"))
                .unwrap(),
            id
        );
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        store
            .insert_address(Catalog::Deterministic, None, &scope().key("1"))
            .unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count_addresses(Catalog::Deterministic).unwrap(), 0);
    }

    #[test]
    fn commit_rechecks_conflicts_from_other_handles() {
        let db = MemoryDatabase::new();
        let mut a = db.connect();
        let mut b = db.connect();

        a.begin().unwrap();
        b.begin().unwrap();
        a.insert_address(Catalog::Lookup, None, &scope().key("7"))
            .unwrap();
        b.insert_address(Catalog::Lookup, None, &scope().key("7"))
            .unwrap();
        a.commit().unwrap();

        let err = b.commit().unwrap_err();
        assert!(matches!(err, StorageError::Constraint { .. }));
        assert_eq!(a.count_addresses(Catalog::Lookup).unwrap(), 1);
    }

    #[test]
    fn duplicate_key_inside_one_transaction_is_rejected() {
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        store
            .insert_address(Catalog::Lookup, None, &scope().key("5"))
            .unwrap();
        assert!(store
            .insert_address(Catalog::Lookup, None, &scope().key("5"))
            .is_err());
    }

    #[test]
    fn dangling_foreign_keys_resolve_to_none() {
        let mut store = MemoryStore::new();
        store
            .insert_entity(
                Catalog::Lookup,
                &EntityRecord {
                    id: Guid::new_random(),
                    tenant_id: scope().tenant_id,
                    site_id: scope().site_id,
                    admin_office_id: Guid::new_random(),
                    reg_office_id: Guid::new_random(),
                    created_at_utc: 0,
                },
            )
            .unwrap();
        let resolved = store.resolved_entities(Catalog::Lookup).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].admin_code, None);
    }
}
