//! SQLite backend.
//!
//! Four tables, one address catalog and one entity table per [`Catalog`].
//! Identifiers are 16-byte BLOBs in native layout. Address ids in the lookup
//! catalog are assigned by SQLite (`randomblob(16)`) and handed back with
//! `RETURNING`, so the client only learns them by asking.

use super::ReferenceStore;
use crate::config::StorageTarget;
use crate::error::{ConfigError, StorageError};
use crate::model::{Catalog, EntityRecord, ReferenceKey, ResolvedEntity};
use guid_core::Guid;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS addresses_db (
        id            BLOB NOT NULL PRIMARY KEY,
        tenant_id     BLOB NOT NULL,
        site_id       BLOB NOT NULL,
        business_code TEXT NOT NULL,
        UNIQUE (tenant_id, site_id, business_code)
    );
    CREATE TABLE IF NOT EXISTS addresses_det (
        id            BLOB NOT NULL PRIMARY KEY,
        tenant_id     BLOB NOT NULL,
        site_id       BLOB NOT NULL,
        business_code TEXT NOT NULL,
        UNIQUE (tenant_id, site_id, business_code)
    );
    CREATE TABLE IF NOT EXISTS entities_db (
        id              BLOB NOT NULL PRIMARY KEY,
        tenant_id       BLOB NOT NULL,
        site_id         BLOB NOT NULL,
        admin_office_id BLOB NOT NULL,
        reg_office_id   BLOB NOT NULL,
        created_at_utc  INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS entities_det (
        id              BLOB NOT NULL PRIMARY KEY,
        tenant_id       BLOB NOT NULL,
        site_id         BLOB NOT NULL,
        admin_office_id BLOB NOT NULL,
        reg_office_id   BLOB NOT NULL,
        created_at_utc  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS ix_entities_db_created ON entities_db (created_at_utc);
    CREATE INDEX IF NOT EXISTS ix_entities_det_created ON entities_det (created_at_utc);
";

/// Statement text per catalog. Kept as literals so `prepare_cached` hits.
struct CatalogSql {
    /// `?1` is the explicit id, or NULL for a store-assigned one.
    insert_address: &'static str,
    lookup_address: &'static str,
    insert_entity: &'static str,
    resolved_entities: &'static str,
    count_addresses: &'static str,
    count_entities: &'static str,
}

const LOOKUP_SQL: CatalogSql = CatalogSql {
    insert_address: "INSERT INTO addresses_db (id, tenant_id, site_id, business_code)
                     VALUES (COALESCE(?1, randomblob(16)), ?2, ?3, ?4) RETURNING id",
    lookup_address: "SELECT id FROM addresses_db
                     WHERE tenant_id = ?1 AND site_id = ?2 AND business_code = ?3",
    insert_entity: "INSERT INTO entities_db
                    (id, tenant_id, site_id, admin_office_id, reg_office_id, created_at_utc)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    resolved_entities: "SELECT e.id, a.business_code, r.business_code
                        FROM entities_db e
                        LEFT JOIN addresses_db a ON a.id = e.admin_office_id
                        LEFT JOIN addresses_db r ON r.id = e.reg_office_id
                        ORDER BY e.rowid",
    count_addresses: "SELECT COUNT(*) FROM addresses_db",
    count_entities: "SELECT COUNT(*) FROM entities_db",
};

const DETERMINISTIC_SQL: CatalogSql = CatalogSql {
    insert_address: "INSERT INTO addresses_det (id, tenant_id, site_id, business_code)
                     VALUES (COALESCE(?1, randomblob(16)), ?2, ?3, ?4) RETURNING id",
    lookup_address: "SELECT id FROM addresses_det
                     WHERE tenant_id = ?1 AND site_id = ?2 AND business_code = ?3",
    insert_entity: "INSERT INTO entities_det
                    (id, tenant_id, site_id, admin_office_id, reg_office_id, created_at_utc)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    resolved_entities: "SELECT e.id, a.business_code, r.business_code
                        FROM entities_det e
                        LEFT JOIN addresses_det a ON a.id = e.admin_office_id
                        LEFT JOIN addresses_det r ON r.id = e.reg_office_id
                        ORDER BY e.rowid",
    count_addresses: "SELECT COUNT(*) FROM addresses_det",
    count_entities: "SELECT COUNT(*) FROM entities_det",
};

fn sql(catalog: Catalog) -> &'static CatalogSql {
    match catalog {
        Catalog::Lookup => &LOOKUP_SQL,
        Catalog::Deterministic => &DETERMINISTIC_SQL,
    }
}

/// Configure a connection for benchmark throughput.
///
/// `busy_timeout` lets concurrent writers on a file database queue for the
/// write lock instead of failing with `SQLITE_BUSY`.
pub fn configure_connection(conn: &Connection) -> Result<(), StorageError> {
    conn.busy_timeout(Duration::from_secs(30))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = OFF;
         PRAGMA cache_size = -131072;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
}

fn map_constraint(catalog: Catalog, err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, detail) if e.code == ErrorCode::ConstraintViolation => {
            StorageError::Constraint {
                catalog,
                detail: detail.clone().unwrap_or_else(|| e.to_string()),
            }
        }
        _ => StorageError::Sqlite(err),
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the target, apply pragmas and create the schema if missing.
    pub fn open(target: &StorageTarget) -> Result<Self, StorageError> {
        let conn = match target {
            StorageTarget::InMemory => Connection::open_in_memory()?,
            StorageTarget::File(path) => Connection::open(path)?,
        };
        Self::from_connection(conn)
    }

    /// [`SqliteStore::open`] for the configured run target. A target that
    /// cannot be opened is a configuration error, raised before any trial.
    pub fn open_target(target: &StorageTarget) -> Result<Self, ConfigError> {
        Self::open(target).map_err(|source| ConfigError::Unreachable {
            target: target.to_string(),
            source,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(&StorageTarget::InMemory)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReferenceStore for SqliteStore {
    fn begin(&mut self) -> Result<(), StorageError> {
        if !self.conn.is_autocommit() {
            return Err(StorageError::Transaction(
                "begin called while a transaction is open".into(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.conn.is_autocommit() {
            return Err(StorageError::Transaction(
                "commit called without an open transaction".into(),
            ));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "DELETE FROM entities_db;
             DELETE FROM entities_det;
             DELETE FROM addresses_db;
             DELETE FROM addresses_det;",
        )?;
        Ok(())
    }

    fn insert_address(
        &mut self,
        catalog: Catalog,
        id: Option<Guid>,
        key: &ReferenceKey,
    ) -> Result<Guid, StorageError> {
        let tenant = key.tenant_id.as_native_bytes().as_slice();
        let site = key.site_id.as_native_bytes().as_slice();

        let explicit = id.map(|id| id.native_bytes());
        let mut stmt = self.conn.prepare_cached(sql(catalog).insert_address)?;
        let raw: Vec<u8> = stmt
            .query_row(
                params![
                    explicit.as_ref().map(|b| b.as_slice()),
                    tenant,
                    site,
                    key.business_code
                ],
                |r| r.get(0),
            )
            .map_err(|e| map_constraint(catalog, e))?;
        Ok(Guid::try_from_native_slice(&raw)?)
    }

    fn lookup_address(
        &mut self,
        catalog: Catalog,
        key: &ReferenceKey,
    ) -> Result<Guid, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql(catalog).lookup_address)?;
        let raw: Option<Vec<u8>> = stmt
            .query_row(
                params![
                    key.tenant_id.as_native_bytes().as_slice(),
                    key.site_id.as_native_bytes().as_slice(),
                    key.business_code
                ],
                |r| r.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Guid::try_from_native_slice(&raw)?),
            None => Err(StorageError::NotFound {
                catalog,
                code: key.business_code.clone(),
            }),
        }
    }

    fn insert_entity(
        &mut self,
        catalog: Catalog,
        entity: &EntityRecord,
    ) -> Result<(), StorageError> {
        self.insert_entities(catalog, std::slice::from_ref(entity))
    }

    fn insert_entities(
        &mut self,
        catalog: Catalog,
        entities: &[EntityRecord],
    ) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare_cached(sql(catalog).insert_entity)?;
        for e in entities {
            stmt.execute(params![
                e.id.as_native_bytes().as_slice(),
                e.tenant_id.as_native_bytes().as_slice(),
                e.site_id.as_native_bytes().as_slice(),
                e.admin_office_id.as_native_bytes().as_slice(),
                e.reg_office_id.as_native_bytes().as_slice(),
                e.created_at_utc
            ])
            .map_err(|err| map_constraint(catalog, err))?;
        }
        Ok(())
    }

    fn resolved_entities(&mut self, catalog: Catalog) -> Result<Vec<ResolvedEntity>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql(catalog).resolved_entities)?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, Vec<u8>>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, admin_code, reg_code)| {
                Ok(ResolvedEntity {
                    entity_id: Guid::try_from_native_slice(&id)?,
                    admin_code,
                    reg_code,
                })
            })
            .collect()
    }

    fn count_addresses(&mut self, catalog: Catalog) -> Result<u64, StorageError> {
        let n: i64 = self
            .conn
            .query_row(sql(catalog).count_addresses, [], |r| r.get(0))?;
        Ok(n as u64)
    }

    fn count_entities(&mut self, catalog: Catalog) -> Result<u64, StorageError> {
        let n: i64 = self
            .conn
            .query_row(sql(catalog).count_entities, [], |r| r.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scope;

    fn scope() -> Scope {
        Scope {
            tenant_id: Guid::from_native_bytes([0xaa; 16]),
            site_id: Guid::from_native_bytes([0xbb; 16]),
        }
    }

    #[test]
    fn assigned_ids_are_returned_and_found_by_lookup() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let key = scope().key("1000");
        let id = store.insert_address(Catalog::Lookup, None, &key).unwrap();
        assert!(!id.is_nil());
        assert_eq!(store.lookup_address(Catalog::Lookup, &key).unwrap(), id);
    }

    #[test]
    fn duplicate_natural_key_is_a_constraint_error() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let key = scope().key("1000");
        store
            .insert_address(Catalog::Deterministic, Some(Guid::new_random()), &key)
            .unwrap();
        let err = store
            .insert_address(Catalog::Deterministic, Some(Guid::new_random()), &key)
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint { .. }), "{err}");
    }

    #[test]
    fn missing_code_is_not_found() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .lookup_address(Catalog::Lookup, &scope().key("9999"))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn rollback_discards_batch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store
            .insert_address(Catalog::Lookup, None, &scope().key("1000"))
            .unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count_addresses(Catalog::Lookup).unwrap(), 0);
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.begin().unwrap();
        assert!(matches!(
            store.begin(),
            Err(StorageError::Transaction(_))
        ));
        store.rollback().unwrap();
    }

    #[test]
    fn reset_empties_every_table() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let key = scope().key("1000");
        let id = store.insert_address(Catalog::Lookup, None, &key).unwrap();
        store
            .insert_entity(
                Catalog::Lookup,
                &EntityRecord {
                    id: Guid::new_random(),
                    tenant_id: key.tenant_id,
                    site_id: key.site_id,
                    admin_office_id: id,
                    reg_office_id: id,
                    created_at_utc: 0,
                },
            )
            .unwrap();
        store.reset().unwrap();
        for catalog in Catalog::ALL {
            assert_eq!(store.count_addresses(catalog).unwrap(), 0);
            assert_eq!(store.count_entities(catalog).unwrap(), 0);
        }
    }

    #[test]
    fn both_catalogs_accept_explicit_and_assigned_ids() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let explicit = Guid::new_random();
        for catalog in Catalog::ALL {
            let given = store
                .insert_address(catalog, Some(explicit), &scope().key("1000"))
                .unwrap();
            assert_eq!(given, explicit);
            let assigned = store
                .insert_address(catalog, None, &scope().key("1001"))
                .unwrap();
            assert_ne!(assigned, explicit);
            assert_eq!(
                store.lookup_address(catalog, &scope().key("1001")).unwrap(),
                assigned
            );
        }
    }

    #[test]
    fn unopenable_target_is_a_configuration_error() {
        let target = StorageTarget::File("/nonexistent/dir/guid-bench.db".into());
        let err = match SqliteStore::open_target(&target) {
            Ok(_) => panic!("opened a database in a missing directory"),
            Err(e) => e,
        };
        assert!(
            matches!(&err, ConfigError::Unreachable { target, .. } if target == "/nonexistent/dir/guid-bench.db"),
            "{err}"
        );
    }
}
