//! Run configuration.
//!
//! Defaults reproduce the reference workload: 2 000 address codes, 50 000
//! entities, fixed tenant/site/namespace identifiers and seed 42. Any value
//! can be overridden through `GUID_BENCH_*` environment variables (a `.env`
//! file in the working directory is honoured).

use crate::error::ConfigError;
use crate::model::Scope;
use guid_core::{Guid, ScopedDeriver};
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_NAMESPACE: Guid = Guid::from_canonical_bytes([
    0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55,
]);
pub const DEFAULT_TENANT: Guid = Guid::from_native_bytes([0xaa; 16]);
pub const DEFAULT_SITE: Guid = Guid::from_native_bytes([0xbb; 16]);

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTarget {
    InMemory,
    File(PathBuf),
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTarget::InMemory => f.write_str(":memory:"),
            StorageTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for StorageTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConfigError::InvalidValue {
                key: "GUID_BENCH_DB".into(),
                value: s.into(),
                reason: "empty storage target".into(),
            }),
            ":memory:" | "memory" => Ok(StorageTarget::InMemory),
            path => Ok(StorageTarget::File(PathBuf::from(path))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    /// Namespace salting address identifiers.
    pub namespace: Guid,
    pub tenant_id: Guid,
    pub site_id: Guid,
    /// Distinct business codes seeded per catalog (`1000..1000 + n`).
    pub address_count: usize,
    /// Entities inserted per strategy per trial.
    pub entity_count: usize,
    pub trials: usize,
    /// Untimed full iterations run before the first measured trial.
    pub warmup_trials: usize,
    pub seed: u64,
    pub target: StorageTarget,
    pub stress_workers: usize,
    pub stress_inserts_per_worker: usize,
    pub baseline_batch_size: usize,
    pub baseline_entities: usize,
    pub json_report: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE,
            tenant_id: DEFAULT_TENANT,
            site_id: DEFAULT_SITE,
            address_count: 2_000,
            entity_count: 50_000,
            trials: 5,
            warmup_trials: 1,
            seed: 42,
            target: StorageTarget::InMemory,
            stress_workers: 4,
            stress_inserts_per_worker: 2_500,
            baseline_batch_size: 1_000,
            baseline_entities: 10_000,
            json_report: Some(PathBuf::from("guid-bench-report.json")),
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl BenchConfig {
    /// Defaults overlaid with `.env` and process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ConfigError::Invalid(format!("unreadable .env file: {e}")));
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides from any key/value source. Split out for tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("GUID_BENCH_DB") {
            config.target = v.parse()?;
        }
        if let Some(v) = lookup("GUID_BENCH_ADDRESSES") {
            config.address_count = parse_var("GUID_BENCH_ADDRESSES", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_ENTITIES") {
            config.entity_count = parse_var("GUID_BENCH_ENTITIES", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_TRIALS") {
            config.trials = parse_var("GUID_BENCH_TRIALS", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_WARMUP") {
            config.warmup_trials = parse_var("GUID_BENCH_WARMUP", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_SEED") {
            config.seed = parse_var("GUID_BENCH_SEED", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_WORKERS") {
            config.stress_workers = parse_var("GUID_BENCH_WORKERS", &v)?;
        }
        if let Some(v) = lookup("GUID_BENCH_JSON") {
            config.json_report = match v.trim() {
                "" | "-" | "off" => None,
                path => Some(PathBuf::from(path)),
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address_count == 0 {
            return Err(ConfigError::Invalid("address_count must be > 0".into()));
        }
        if self.entity_count == 0 {
            return Err(ConfigError::Invalid("entity_count must be > 0".into()));
        }
        if self.trials == 0 {
            return Err(ConfigError::Invalid("trials must be > 0".into()));
        }
        if self.baseline_batch_size == 0 {
            return Err(ConfigError::Invalid("baseline_batch_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn scope(&self) -> Scope {
        Scope {
            tenant_id: self.tenant_id,
            site_id: self.site_id,
        }
    }

    pub fn deriver(&self) -> ScopedDeriver {
        ScopedDeriver::new(self.namespace, self.tenant_id, self.site_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_identifiers_match_reference_text() {
        let config = BenchConfig::default();
        assert_eq!(
            config.namespace.to_string(),
            "11111111-2222-3333-4444-555555555555"
        );
        assert_eq!(
            config.tenant_id.to_string(),
            "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa"
        );
        assert_eq!(
            config.site_id.to_string(),
            "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb"
        );
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = BenchConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.address_count, 2_000);
        assert_eq!(config.entity_count, 50_000);
        assert_eq!(config.seed, 42);
        assert_eq!(config.target, StorageTarget::InMemory);
    }

    #[test]
    fn overrides_are_applied() {
        let config = BenchConfig::from_lookup(lookup_from(&[
            ("GUID_BENCH_DB", "/tmp/bench.db"),
            ("GUID_BENCH_TRIALS", "3"),
            ("GUID_BENCH_SEED", "7"),
            ("GUID_BENCH_JSON", "off"),
        ]))
        .unwrap();
        assert_eq!(
            config.target,
            StorageTarget::File(PathBuf::from("/tmp/bench.db"))
        );
        assert_eq!(config.trials, 3);
        assert_eq!(config.seed, 7);
        assert_eq!(config.json_report, None);
    }

    #[test]
    fn malformed_number_is_a_configuration_error() {
        let err = BenchConfig::from_lookup(lookup_from(&[("GUID_BENCH_TRIALS", "five")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
    }

    #[test]
    fn every_zero_size_is_rejected() {
        let cases: [(&str, fn(&mut BenchConfig)); 4] = [
            ("address_count", |c| c.address_count = 0),
            ("entity_count", |c| c.entity_count = 0),
            ("trials", |c| c.trials = 0),
            ("baseline_batch_size", |c| c.baseline_batch_size = 0),
        ];
        for (field, zero) in cases {
            let mut config = BenchConfig::default();
            zero(&mut config);
            match config.validate() {
                Err(ConfigError::Invalid(reason)) => assert!(reason.contains(field), "{reason}"),
                other => panic!("{field} = 0 accepted: {other:?}"),
            }
        }
        assert!(BenchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_addresses_from_environment_is_rejected() {
        let err = BenchConfig::from_lookup(lookup_from(&[("GUID_BENCH_ADDRESSES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn zero_trials_is_rejected() {
        let err =
            BenchConfig::from_lookup(lookup_from(&[("GUID_BENCH_TRIALS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
