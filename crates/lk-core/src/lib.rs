//! lk-core - Core library for Linekeeper
//!
//! This crate provides the domain types, configuration parsing, and the pure
//! decision functions (quality scoring, health classification, gap and
//! dead-tuple evaluation, identity reconciliation) shared by the monitoring
//! store and the CLI. Nothing here touches a database or the clock; callers
//! pass `now` explicitly.

pub mod alert;
pub mod collection;
pub mod config;
pub mod dead_tuple;
pub mod error;
pub mod gap;
pub mod health;
pub mod identity;
mod newtype_string;
pub mod quality;
pub mod source_name;

pub use alert::{Alert, AlertConfig, AlertKind, NewAlert, Severity};
pub use collection::{CollectionRun, RunOutcome, RunStatus};
pub use config::{Config, SchedulerConfig};
pub use dead_tuple::{DeadTupleConfig, DeadTupleSample, TableStats};
pub use error::{CoreError, CoreResult};
pub use gap::{BusinessImpact, Gap, GapConfig, GapDecision, GapMeasure};
pub use health::{
    AlertLevel, AlertLevelThresholds, HealthMetrics, HealthSnapshot, HealthStatus,
    HealthThresholds,
};
pub use identity::{CanonicalGameId, GameIdentity, IdentityConfig, IdentityIndex, Provider};
pub use quality::{
    BatchReport, BatchResult, GameFields, QualityScore, QualitySettings, QualityTier,
};
pub use source_name::SourceName;
