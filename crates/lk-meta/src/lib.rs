//! Monitoring database for Linekeeper.
//!
//! A DuckDB-backed store for collection runs, health snapshots, gaps,
//! dead-tuple samples, alerts, quality configuration, curated game scores and
//! game identities. Every mutation goes through the functions in this crate;
//! decisions are delegated to the pure functions in `lk-core`.

pub mod alerts;
pub mod collection;
pub mod connection;
pub mod dead_tuples;
pub mod ddl;
pub mod error;
pub mod games;
pub mod gaps;
pub mod health;
pub mod identity;
pub mod jobs;
pub mod migration;
pub mod quality_config;
pub mod query;
pub(crate) mod row_helpers;

pub use connection::MonitorDb;
pub use error::{MetaError, MetaResult};
