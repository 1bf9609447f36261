//! Dead-tuple (table bloat) sampling

use crate::alert::Severity;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Decimal places kept for stored ratios
pub const RATIO_SCALE: i32 = 4;

/// Dead-tuple monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadTupleConfig {
    /// Vacuum is recommended above this dead/live ratio
    #[serde(default = "default_threshold_ratio")]
    pub threshold_ratio: f64,

    /// Alerts above this ratio are critical instead of warnings
    #[serde(default = "default_critical_ratio")]
    pub critical_ratio: f64,

    /// JSON file with table statistics exported by the warehouse host
    #[serde(default)]
    pub stats_feed: Option<String>,
}

fn default_threshold_ratio() -> f64 {
    0.5
}

fn default_critical_ratio() -> f64 {
    0.8
}

impl Default for DeadTupleConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: default_threshold_ratio(),
            critical_ratio: default_critical_ratio(),
            stats_feed: None,
        }
    }
}

impl DeadTupleConfig {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        for (name, value) in [
            ("dead_tuples.threshold_ratio", self.threshold_ratio),
            ("dead_tuples.critical_ratio", self.critical_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{name} must be positive, got {value}"),
                });
            }
        }
        if self.critical_ratio < self.threshold_ratio {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "dead_tuples.critical_ratio ({}) must not be below threshold_ratio ({})",
                    self.critical_ratio, self.threshold_ratio
                ),
            });
        }
        Ok(())
    }
}

/// Raw statistics for one table, as exported by the warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub schema: String,
    pub table: String,
    pub live_tuples: u64,
    pub dead_tuples: u64,
}

/// Dead-to-live ratio rounded to [`RATIO_SCALE`] places.
///
/// An empty table with dead tuples uses a denominator of one so the ratio
/// still crosses any threshold.
pub fn dead_ratio(live: u64, dead: u64) -> f64 {
    if dead == 0 {
        return 0.0;
    }
    let raw = dead as f64 / live.max(1) as f64;
    let scale = 10f64.powi(RATIO_SCALE);
    (raw * scale).round() / scale
}

/// One computed sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadTupleSample {
    pub schema_name: String,
    pub table_name: String,
    pub live_tuples: u64,
    pub dead_tuples: u64,
    pub dead_ratio: f64,
    pub vacuum_recommended: bool,
}

impl DeadTupleSample {
    /// Compute a sample from raw statistics.
    pub fn compute(stats: &TableStats, cfg: &DeadTupleConfig) -> CoreResult<Self> {
        let schema = stats.schema.trim();
        let table = stats.table.trim();
        if schema.is_empty() {
            return Err(CoreError::invalid("schema", "must not be blank"));
        }
        if table.is_empty() {
            return Err(CoreError::invalid("table", "must not be blank"));
        }
        let ratio = dead_ratio(stats.live_tuples, stats.dead_tuples);
        Ok(Self {
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            live_tuples: stats.live_tuples,
            dead_tuples: stats.dead_tuples,
            dead_ratio: ratio,
            vacuum_recommended: ratio > cfg.threshold_ratio,
        })
    }

    /// `schema.table`, used as the alert source
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// Severity of the alert this sample warrants, if any.
    pub fn alert_severity(&self, cfg: &DeadTupleConfig) -> Option<Severity> {
        if !self.vacuum_recommended {
            None
        } else if self.dead_ratio > cfg.critical_ratio {
            Some(Severity::Critical)
        } else {
            Some(Severity::Warning)
        }
    }
}

#[cfg(test)]
#[path = "dead_tuple_test.rs"]
mod tests;
