use crate::model::Catalog;
use guid_core::EncodingError;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Failures raised by a [`crate::store::ReferenceStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("no {catalog} address with business code {code:?}")]
    NotFound { catalog: Catalog, code: String },
    #[error("{catalog} uniqueness constraint violated: {detail}")]
    Constraint { catalog: Catalog, detail: String },
    #[error("transaction: {0}")]
    Transaction(String),
    #[error("stored identifier is malformed")]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("storage target {target} is unreachable")]
    Unreachable {
        target: String,
        #[source]
        source: StorageError,
    },
}

/// Step of a benchmark run, used to say where a run aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reset,
    Seed,
    Warmup,
    TimedExecution,
    Baseline,
    Aggregation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Reset => "reset",
            Phase::Seed => "seed",
            Phase::Warmup => "warmup",
            Phase::TimedExecution => "timed execution",
            Phase::Baseline => "insert-only baseline",
            Phase::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("{phase} failed ({strategy} strategy{})", trial_label(.trial))]
    Storage {
        phase: Phase,
        strategy: &'static str,
        /// `None` outside the trial loop (insert-only baseline).
        trial: Option<usize>,
        #[source]
        source: StorageError,
    },
    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

fn trial_label(trial: &Option<usize>) -> String {
    match trial {
        Some(t) => format!(", trial {t}"),
        None => String::new(),
    }
}

impl BenchError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            BenchError::Storage { phase, .. } => Some(*phase),
            BenchError::Aggregation(_) => Some(Phase::Aggregation),
            BenchError::Configuration(_) => None,
        }
    }
}

/// An error and its sources, outermost first, joined with `": "`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causes_are_printed_once() {
        let err = BenchError::Storage {
            phase: Phase::TimedExecution,
            strategy: "deterministic",
            trial: Some(2),
            source: StorageError::Transaction("commit refused".into()),
        };
        assert_eq!(
            error_chain(&err),
            "timed execution failed (deterministic strategy, trial 2): transaction: commit refused"
        );
        assert_eq!(
            format!("{:#}", anyhow::Error::new(err)),
            "timed execution failed (deterministic strategy, trial 2): transaction: commit refused"
        );
    }

    #[test]
    fn unreachable_target_names_its_cause_once() {
        let err = ConfigError::Unreachable {
            target: "/nonexistent/x.db".into(),
            source: StorageError::Transaction("cannot open".into()),
        };
        let text = error_chain(&err);
        assert_eq!(text.matches("cannot open").count(), 1, "{text}");
    }

    #[test]
    fn baseline_failures_carry_no_trial_index() {
        let err = BenchError::Storage {
            phase: Phase::Baseline,
            strategy: "db-lookup",
            trial: None,
            source: StorageError::Transaction("busy".into()),
        };
        assert_eq!(
            err.to_string(),
            "insert-only baseline failed (db-lookup strategy)"
        );
    }
}
