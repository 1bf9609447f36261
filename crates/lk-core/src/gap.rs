//! Collection gap detection

use crate::alert::Severity;
use crate::error::{CoreError, CoreResult};
use crate::health::hours_between;
use crate::source_name::SourceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Business impact of a gap, bucketed by its length
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessImpact {
    Low,
    Medium,
    High,
    Critical,
}

impl BusinessImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessImpact::Low => "low",
            BusinessImpact::Medium => "medium",
            BusinessImpact::High => "high",
            BusinessImpact::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "low" => Ok(BusinessImpact::Low),
            "medium" => Ok(BusinessImpact::Medium),
            "high" => Ok(BusinessImpact::High),
            "critical" => Ok(BusinessImpact::Critical),
            other => Err(CoreError::UnknownLabel {
                kind: "business impact",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BusinessImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gap detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GapConfig {
    /// A gap opens once the last success is older than this
    #[serde(default = "default_threshold_hours")]
    pub threshold_hours: f64,

    /// Days of successful runs used for the per-hour volume baseline
    #[serde(default = "default_history_days")]
    pub history_days: i64,

    /// Gaps longer than this raise a critical alert instead of a warning
    #[serde(default = "default_critical_alert_hours")]
    pub critical_alert_hours: f64,

    #[serde(default = "default_impact_medium_hours")]
    pub impact_medium_hours: f64,
    #[serde(default = "default_impact_high_hours")]
    pub impact_high_hours: f64,
    #[serde(default = "default_impact_critical_hours")]
    pub impact_critical_hours: f64,
}

fn default_threshold_hours() -> f64 {
    4.0
}
fn default_history_days() -> i64 {
    7
}
fn default_critical_alert_hours() -> f64 {
    8.0
}
fn default_impact_medium_hours() -> f64 {
    6.0
}
fn default_impact_high_hours() -> f64 {
    12.0
}
fn default_impact_critical_hours() -> f64 {
    24.0
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            threshold_hours: default_threshold_hours(),
            history_days: default_history_days(),
            critical_alert_hours: default_critical_alert_hours(),
            impact_medium_hours: default_impact_medium_hours(),
            impact_high_hours: default_impact_high_hours(),
            impact_critical_hours: default_impact_critical_hours(),
        }
    }
}

impl GapConfig {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        if !(self.threshold_hours.is_finite() && self.threshold_hours > 0.0) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "gaps.threshold_hours must be positive, got {}",
                    self.threshold_hours
                ),
            });
        }
        if self.history_days <= 0 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "gaps.history_days must be positive, got {}",
                    self.history_days
                ),
            });
        }
        if !(self.impact_medium_hours <= self.impact_high_hours
            && self.impact_high_hours <= self.impact_critical_hours)
        {
            return Err(CoreError::ConfigInvalid {
                message: "gaps impact buckets must satisfy medium <= high <= critical".to_string(),
            });
        }
        Ok(())
    }
}

/// Classify the business impact of a gap of `gap_hours`.
pub fn classify_impact(gap_hours: f64, cfg: &GapConfig) -> BusinessImpact {
    if gap_hours > cfg.impact_critical_hours {
        BusinessImpact::Critical
    } else if gap_hours > cfg.impact_high_hours {
        BusinessImpact::High
    } else if gap_hours > cfg.impact_medium_hours {
        BusinessImpact::Medium
    } else {
        BusinessImpact::Low
    }
}

/// Records expected during the gap at the historical per-hour volume.
pub fn estimate_missing_records(avg_records_per_hour: f64, gap_hours: f64) -> u64 {
    if !(avg_records_per_hour.is_finite() && avg_records_per_hour > 0.0) {
        return 0;
    }
    (avg_records_per_hour * gap_hours).round() as u64
}

/// Severity of the alert paired with a newly opened gap.
pub fn gap_alert_severity(gap_hours: f64, cfg: &GapConfig) -> Severity {
    if gap_hours > cfg.critical_alert_hours {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

/// A stored gap
#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub gap_id: i64,
    pub source: SourceName,
    pub gap_start: DateTime<Utc>,
    pub gap_end: Option<DateTime<Utc>>,
    pub gap_hours: f64,
    pub estimated_missing_records: u64,
    pub business_impact: BusinessImpact,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gap {
    pub fn is_open(&self) -> bool {
        self.gap_end.is_none()
    }
}

/// Measurements shared by the open and extend decisions
#[derive(Debug, Clone, PartialEq)]
pub struct GapMeasure {
    pub gap_start: DateTime<Utc>,
    pub gap_hours: f64,
    pub estimated_missing_records: u64,
    pub business_impact: BusinessImpact,
}

/// What the detector should do for one source
#[derive(Debug, Clone, PartialEq)]
pub enum GapDecision {
    /// The source is within its threshold
    WithinThreshold,
    /// Record a new gap and raise the paired alert
    Open(GapMeasure),
    /// Refresh an existing open gap; no new alert
    Extend { gap_id: i64, measure: GapMeasure },
}

/// Decide whether a source has an open gap.
///
/// `since` is the last successful collection (or the first attempt when the
/// source never succeeded). `open_gaps` are the source's unresolved gaps. An
/// unresolved gap starting at or after `since` already covers this outage,
/// so it is extended instead of duplicated.
pub fn evaluate_gap(
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    open_gaps: &[Gap],
    avg_records_per_hour: f64,
    cfg: &GapConfig,
) -> GapDecision {
    let hours = hours_between(since, now);
    if hours <= cfg.threshold_hours {
        return GapDecision::WithinThreshold;
    }

    if let Some(existing) = open_gaps
        .iter()
        .filter(|g| g.is_open() && g.gap_start >= since)
        .min_by_key(|g| g.gap_start)
    {
        let gap_hours = hours_between(existing.gap_start, now);
        return GapDecision::Extend {
            gap_id: existing.gap_id,
            measure: GapMeasure {
                gap_start: existing.gap_start,
                gap_hours,
                estimated_missing_records: estimate_missing_records(avg_records_per_hour, gap_hours),
                business_impact: classify_impact(gap_hours, cfg),
            },
        };
    }

    GapDecision::Open(GapMeasure {
        gap_start: since,
        gap_hours: hours,
        estimated_missing_records: estimate_missing_records(avg_records_per_hour, hours),
        business_impact: classify_impact(hours, cfg),
    })
}

#[cfg(test)]
#[path = "gap_test.rs"]
mod tests;
