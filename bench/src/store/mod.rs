//! Storage abstraction and the `ReferenceStore` trait.
//!
//! Two implementations are provided:
//! - [`sqlite::SqliteStore`]: rusqlite over an in-memory or on-disk database
//! - [`memory::MemoryStore`]: a lock-protected in-process fake for tests
//!
//! Operations are typed rather than free-form SQL so both backends serve the
//! same contract. All writes between [`ReferenceStore::begin`] and
//! [`ReferenceStore::commit`] become visible together; a rollback discards
//! all of them.

pub mod memory;
pub mod sqlite;

use crate::error::{error_chain, StorageError};
use crate::model::{Catalog, EntityRecord, ReferenceKey, ResolvedEntity};
use guid_core::Guid;

pub trait ReferenceStore {
    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;

    /// Delete every address and entity record in both catalogs.
    fn reset(&mut self) -> Result<(), StorageError>;

    /// Insert one address. With `id == None` the store assigns the
    /// identifier; either way the stored identifier is returned.
    fn insert_address(
        &mut self,
        catalog: Catalog,
        id: Option<Guid>,
        key: &ReferenceKey,
    ) -> Result<Guid, StorageError>;

    /// Scalar lookup of an address id by natural key.
    fn lookup_address(&mut self, catalog: Catalog, key: &ReferenceKey)
        -> Result<Guid, StorageError>;

    fn insert_entity(&mut self, catalog: Catalog, entity: &EntityRecord)
        -> Result<(), StorageError>;

    /// Batch-execute form of [`ReferenceStore::insert_entity`].
    fn insert_entities(
        &mut self,
        catalog: Catalog,
        entities: &[EntityRecord],
    ) -> Result<(), StorageError> {
        for entity in entities {
            self.insert_entity(catalog, entity)?;
        }
        Ok(())
    }

    /// Join every entity in `catalog` to its admin and registered office.
    fn resolved_entities(&mut self, catalog: Catalog) -> Result<Vec<ResolvedEntity>, StorageError>;

    fn count_addresses(&mut self, catalog: Catalog) -> Result<u64, StorageError>;

    fn count_entities(&mut self, catalog: Catalog) -> Result<u64, StorageError>;
}

/// Runs `f` inside one transaction: commit on success, rollback on failure.
pub fn in_transaction<S, T, F>(store: &mut S, f: F) -> Result<T, StorageError>
where
    S: ReferenceStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T, StorageError>,
{
    store.begin()?;
    let outcome = f(store).and_then(|value| store.commit().map(|_| value));
    if outcome.is_err() {
        if let Err(rollback_err) = store.rollback() {
            log::warn!(
                "rollback after failed batch also failed: {}",
                error_chain(&rollback_err)
            );
        }
    }
    outcome
}
