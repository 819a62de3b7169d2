//! Name-based (version 5) deterministic identifiers.
//!
//! `derive(namespace, name)` hashes the namespace's canonical bytes followed
//! by the UTF-8 name with SHA-1, keeps the first 16 digest bytes, stamps the
//! version nibble and RFC 4122 variant, then converts the result from
//! canonical to native layout. The output depends on nothing but its inputs.

use crate::guid::Guid;
use sha1::{Digest, Sha1};
use std::fmt::Write as _;

/// Derives the version-5 identifier for `name` inside `namespace`.
pub fn derive(namespace: Guid, name: &str) -> Guid {
    let mut hasher = Sha1::new();
    hasher.update(namespace.to_canonical_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0F) | 0x50;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    Guid::from_canonical_bytes(bytes)
}

/// `"{tenant}|{site}|{code}"` with both identifiers in canonical text form.
///
/// Identifier text is always 36 characters, so the join cannot be
/// re-segmented into a different triple.
pub fn reference_name(tenant_id: Guid, site_id: Guid, business_code: &str) -> String {
    let mut name = String::with_capacity(36 + 1 + 36 + 1 + business_code.len());
    // Writing into a String cannot fail.
    let _ = write!(name, "{tenant_id}|{site_id}|{business_code}");
    name
}

/// Derivation bound to one entity-type namespace and one tenant/site scope.
///
/// Holds no mutable state; cloning or sharing it across threads is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedDeriver {
    namespace: Guid,
    tenant_id: Guid,
    site_id: Guid,
}

impl ScopedDeriver {
    pub fn new(namespace: Guid, tenant_id: Guid, site_id: Guid) -> Self {
        Self {
            namespace,
            tenant_id,
            site_id,
        }
    }

    /// Identifier of the record keyed by `business_code` in this scope.
    pub fn id_for(&self, business_code: &str) -> Guid {
        derive(
            self.namespace,
            &reference_name(self.tenant_id, self.site_id, business_code),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn ns() -> Guid {
        "11111111-2222-3333-4444-555555555555".parse().unwrap()
    }
    fn tenant() -> Guid {
        "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".parse().unwrap()
    }
    fn site() -> Guid {
        "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".parse().unwrap()
    }

    #[test]
    fn golden_vector_for_code_1000() {
        let id = derive(ns(), &reference_name(tenant(), site(), "1000"));
        assert_eq!(id.to_string(), "faf87bb1-4ae4-5ea8-9382-df56f3557606");
        assert_eq!(
            id.native_bytes(),
            [
                0xb1, 0x7b, 0xf8, 0xfa, 0xe4, 0x4a, 0xa8, 0x5e, 0x93, 0x82, 0xdf, 0x56, 0xf3, 0x55,
                0x76, 0x06
            ]
        );
    }

    #[test]
    fn second_golden_vector_for_code_2999() {
        let d = ScopedDeriver::new(ns(), tenant(), site());
        assert_eq!(
            d.id_for("2999").to_string(),
            "9a169b2a-5b14-57ac-b549-fe325ffaaeb7"
        );
    }

    #[test]
    fn matches_uuid_crate_v5() {
        let name = reference_name(tenant(), site(), "1234");
        let expected = Uuid::new_v5(&ns().as_uuid(), name.as_bytes());
        assert_eq!(derive(ns(), &name).as_uuid(), expected);

        let dns = Guid::from(Uuid::NAMESPACE_DNS);
        assert_eq!(
            derive(dns, "python.org").to_string(),
            "886313e1-3b8a-5372-9b90-0c9aee199e5d"
        );
    }

    #[test]
    fn repeated_derivation_is_identical() {
        let d = ScopedDeriver::new(ns(), tenant(), site());
        for code in ["1000", "1001", "", "ünïcödé"] {
            assert_eq!(d.id_for(code), d.id_for(code));
        }
    }

    #[test]
    fn version_and_variant_are_stamped() {
        let d = ScopedDeriver::new(ns(), tenant(), site());
        for i in 0..500 {
            let id = d.id_for(&i.to_string());
            assert_eq!(id.version(), 5);
            assert!(id.is_rfc4122_variant());
        }
    }

    #[test]
    fn ten_thousand_distinct_triples_give_distinct_ids() {
        let mut seen = HashSet::new();
        for t in 0..10u8 {
            let tenant = Guid::from_native_bytes([t; 16]);
            for s in 0..10u8 {
                let site = Guid::from_native_bytes([s.wrapping_add(100); 16]);
                let d = ScopedDeriver::new(ns(), tenant, site);
                for code in 0..100 {
                    seen.insert(d.id_for(&format!("{}", 1000 + code)));
                }
            }
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn namespace_separates_identifier_spaces() {
        let other: Guid = "22222222-3333-4444-5555-666666666666".parse().unwrap();
        let name = reference_name(tenant(), site(), "1000");
        assert_ne!(derive(ns(), &name), derive(other, &name));
    }

    #[test]
    fn reference_name_uses_canonical_text() {
        assert_eq!(
            reference_name(tenant(), site(), "42"),
            "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa|bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb|42"
        );
    }
}
