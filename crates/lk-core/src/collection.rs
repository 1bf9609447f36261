//! Collection runs reported by the data collectors
//!
//! A run is opened when a collector starts an attempt and closed exactly once
//! with a [`RunOutcome`]. Closed runs are immutable.

use crate::error::{ensure_unit_interval, CoreError, CoreResult};
use crate::source_name::SourceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run started but not yet reported
    Running,
    /// Collection completed normally
    Success,
    /// Collection completed with some records missing or invalid
    Partial,
    /// Collection failed
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(CoreError::UnknownLabel {
                kind: "run status",
                value: other.to_string(),
            }),
        }
    }

    /// Whether the run counts as a successful collection for gap tracking.
    pub fn is_successful(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Partial)
    }

    /// Whether the run has been closed
    pub fn is_closed(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result reported by a collector when it closes a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub records_collected: u64,
    pub records_valid: u64,
    pub records_invalid: u64,
    /// Collector's own confidence in the batch, in `[0, 1]`
    pub confidence_score: f64,
    #[serde(default)]
    pub avg_response_ms: Option<f64>,
    #[serde(default)]
    pub max_response_ms: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RunOutcome {
    /// Validate the outcome before it is written.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.status.is_closed() {
            return Err(CoreError::invalid(
                "status",
                "a run can only be closed as success, partial, or failed",
            ));
        }
        ensure_unit_interval("confidence_score", self.confidence_score)?;
        let counted = self.records_valid.checked_add(self.records_invalid);
        if counted.map_or(true, |sum| sum > self.records_collected) {
            return Err(CoreError::invalid(
                "records_valid",
                format!(
                    "valid ({}) + invalid ({}) exceeds collected ({})",
                    self.records_valid, self.records_invalid, self.records_collected
                ),
            ));
        }
        for (name, value) in [
            ("avg_response_ms", self.avg_response_ms),
            ("max_response_ms", self.max_response_ms),
        ] {
            if let Some(ms) = value {
                if !ms.is_finite() || ms < 0.0 {
                    return Err(CoreError::invalid(name, format!("{ms} is not a valid duration")));
                }
            }
        }
        Ok(())
    }
}

/// A collection run as stored
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRun {
    pub run_id: i64,
    pub source: SourceName,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub records_collected: u64,
    pub records_valid: u64,
    pub records_invalid: u64,
    pub confidence_score: f64,
    pub avg_response_ms: Option<f64>,
    pub max_response_ms: Option<f64>,
    pub error_message: Option<String>,
}

impl CollectionRun {
    /// Fraction of collected records that were valid; 0 when nothing was
    /// collected.
    pub fn success_rate(&self) -> f64 {
        if self.records_collected == 0 {
            0.0
        } else {
            self.records_valid as f64 / self.records_collected as f64
        }
    }
}

#[cfg(test)]
#[path = "collection_test.rs"]
mod tests;
