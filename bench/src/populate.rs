//! Workload generation: the address catalog and the reference pairs every
//! trial inserts. Built once per run from a fixed seed so trials compare like
//! with like.

use crate::config::BenchConfig;
use crate::model::{ReferenceKey, ReferencePair, Scope};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Business codes are decimal strings starting here.
pub const FIRST_CODE: usize = 1000;

#[derive(Debug, Clone)]
pub struct Workload {
    pub catalog: Vec<ReferenceKey>,
    pub pairs: Vec<ReferencePair>,
}

impl Workload {
    pub fn generate(config: &BenchConfig) -> Self {
        Self::with_sizes(
            config.scope(),
            config.address_count,
            config.entity_count,
            config.seed,
        )
    }

    pub fn with_sizes(scope: Scope, address_count: usize, entity_count: usize, seed: u64) -> Self {
        Self {
            catalog: catalog_keys(scope, address_count),
            pairs: reference_pairs(address_count, entity_count, seed),
        }
    }
}

pub fn catalog_keys(scope: Scope, address_count: usize) -> Vec<ReferenceKey> {
    (0..address_count)
        .map(|i| scope.key(&(FIRST_CODE + i).to_string()))
        .collect()
}

/// `entity_count` pairs of codes drawn uniformly from the seeded catalog.
pub fn reference_pairs(address_count: usize, entity_count: usize, seed: u64) -> Vec<ReferencePair> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..entity_count)
        .map(|_| {
            let admin = FIRST_CODE + rng.gen_range(0..address_count);
            let reg = FIRST_CODE + rng.gen_range(0..address_count);
            ReferencePair {
                admin_code: admin.to_string(),
                reg_code: reg.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;

    #[test]
    fn same_seed_same_workload() {
        let config = BenchConfig {
            entity_count: 500,
            ..BenchConfig::default()
        };
        let a = Workload::generate(&config);
        let b = Workload::generate(&config);
        assert_eq!(a.pairs, b.pairs);
        assert_eq!(a.catalog, b.catalog);
    }

    #[test]
    fn different_seed_different_pairs() {
        let a = reference_pairs(2_000, 100, 1);
        let b = reference_pairs(2_000, 100, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn codes_stay_inside_the_catalog() {
        let pairs = reference_pairs(10, 1_000, 42);
        for p in &pairs {
            for code in [&p.admin_code, &p.reg_code] {
                let n: usize = code.parse().unwrap();
                assert!((FIRST_CODE..FIRST_CODE + 10).contains(&n));
            }
        }
    }

    #[test]
    fn catalog_codes_are_sequential() {
        let config = BenchConfig::default();
        let keys = catalog_keys(config.scope(), 3);
        let codes: Vec<_> = keys.iter().map(|k| k.business_code.as_str()).collect();
        assert_eq!(codes, ["1000", "1001", "1002"]);
    }
}
