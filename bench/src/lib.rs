//! Foreign-key resolution benchmark
//!
//! Measures what it costs to resolve foreign keys at write time in a
//! multi-tenant schema under two strategies:
//! - **DB lookup**: address ids are assigned by the database, so each
//!   reference is a scalar `SELECT` before the insert
//! - **Deterministic**: address ids are name-based (v5) identifiers derived
//!   from (namespace, tenant, site, business code), so references are
//!   computed locally with zero lookups
//!
//! Run the benchmark: `cargo run --release -p guid-bench`
//! Run micro-benchmarks: `cargo bench -p guid-bench`

pub mod baseline;
pub mod config;
pub mod error;
pub mod harness;
pub mod model;
pub mod populate;
pub mod probe;
pub mod report;
pub mod store;
pub mod strategy;
pub mod stress;
