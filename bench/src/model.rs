//! Records written and read by the benchmark.

use guid_core::Guid;
use serde::Serialize;
use std::fmt;

/// Which logical partition a record lives in: the catalog whose ids are
/// assigned by the store, or the one whose ids are derived by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalog {
    Lookup,
    Deterministic,
}

impl Catalog {
    pub const ALL: [Catalog; 2] = [Catalog::Lookup, Catalog::Deterministic];

    pub fn address_table(&self) -> &'static str {
        match self {
            Catalog::Lookup => "addresses_db",
            Catalog::Deterministic => "addresses_det",
        }
    }

    pub fn entity_table(&self) -> &'static str {
        match self {
            Catalog::Lookup => "entities_db",
            Catalog::Deterministic => "entities_det",
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Catalog::Lookup => f.write_str("lookup"),
            Catalog::Deterministic => f.write_str("deterministic"),
        }
    }
}

/// Tenant + site pair every reference in a run is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Scope {
    pub tenant_id: Guid,
    pub site_id: Guid,
}

impl Scope {
    pub fn key(&self, business_code: &str) -> ReferenceKey {
        ReferenceKey {
            tenant_id: self.tenant_id,
            site_id: self.site_id,
            business_code: business_code.to_string(),
        }
    }
}

/// Natural key of an address: unique within a tenant + site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub tenant_id: Guid,
    pub site_id: Guid,
    pub business_code: String,
}

/// The two address codes one entity refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePair {
    pub admin_code: String,
    pub reg_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub id: Guid,
    pub key: ReferenceKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: Guid,
    pub tenant_id: Guid,
    pub site_id: Guid,
    pub admin_office_id: Guid,
    pub reg_office_id: Guid,
    pub created_at_utc: i64,
}

/// An entity joined back to its address catalog by foreign key.
/// A code is `None` when the foreign key points at no address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub entity_id: Guid,
    pub admin_code: Option<String>,
    pub reg_code: Option<String>,
}
