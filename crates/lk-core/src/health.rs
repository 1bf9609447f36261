//! Source health classification
//!
//! Health status and alert level are both derived from the same
//! [`HealthMetrics`], but each has its own boundaries so that alerting
//! cadence can be tuned without changing how a source is classified.
//!
//! ```text
//! unknown ──first run──▶ healthy ⇄ degraded ⇄ critical
//! ```

use crate::collection::CollectionRun;
use crate::error::{CoreError, CoreResult};
use crate::source_name::SourceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No run has been recorded yet
    Unknown,
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "unknown" => Ok(HealthStatus::Unknown),
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "critical" => Ok(HealthStatus::Critical),
            other => Err(CoreError::UnknownLabel {
                kind: "health status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert level derived from health metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "normal" => Ok(AlertLevel::Normal),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(CoreError::UnknownLabel {
                kind: "alert level",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling metrics for one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    /// Mean per-run success rate over the window
    pub success_rate: f64,
    /// Mean collector confidence over the window
    pub confidence: f64,
    /// Hours since the last successful collection
    pub gap_hours: f64,
    /// Failed runs at the head of the history
    pub consecutive_failures: u32,
    /// Runs that contributed to the averages
    pub runs_considered: u32,
}

/// Boundaries for [`classify_health`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthThresholds {
    /// Number of most recent closed runs averaged into the metrics
    #[serde(default = "default_window_runs")]
    pub window_runs: u32,

    #[serde(default = "default_healthy_success_rate")]
    pub healthy_min_success_rate: f64,
    #[serde(default = "default_healthy_confidence")]
    pub healthy_min_confidence: f64,
    /// Healthy requires the gap to be strictly below this
    #[serde(default = "default_healthy_gap_hours")]
    pub healthy_max_gap_hours: f64,
    /// Healthy requires fewer consecutive failures than this
    #[serde(default = "default_healthy_failures")]
    pub healthy_max_consecutive_failures: u32,

    #[serde(default = "default_critical_success_rate")]
    pub critical_success_rate: f64,
    #[serde(default = "default_critical_confidence")]
    pub critical_confidence: f64,
    #[serde(default = "default_critical_gap_hours")]
    pub critical_gap_hours: f64,
    #[serde(default = "default_critical_failures")]
    pub critical_consecutive_failures: u32,
}

fn default_window_runs() -> u32 {
    3
}
fn default_healthy_success_rate() -> f64 {
    0.9
}
fn default_healthy_confidence() -> f64 {
    0.8
}
fn default_healthy_gap_hours() -> f64 {
    1.0
}
fn default_healthy_failures() -> u32 {
    3
}
fn default_critical_success_rate() -> f64 {
    0.5
}
fn default_critical_confidence() -> f64 {
    0.5
}
fn default_critical_gap_hours() -> f64 {
    4.0
}
fn default_critical_failures() -> u32 {
    5
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            window_runs: default_window_runs(),
            healthy_min_success_rate: default_healthy_success_rate(),
            healthy_min_confidence: default_healthy_confidence(),
            healthy_max_gap_hours: default_healthy_gap_hours(),
            healthy_max_consecutive_failures: default_healthy_failures(),
            critical_success_rate: default_critical_success_rate(),
            critical_confidence: default_critical_confidence(),
            critical_gap_hours: default_critical_gap_hours(),
            critical_consecutive_failures: default_critical_failures(),
        }
    }
}

/// Boundaries for [`classify_alert_level`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertLevelThresholds {
    #[serde(default = "default_critical_success_rate")]
    pub critical_success_rate: f64,
    #[serde(default = "default_critical_confidence")]
    pub critical_confidence: f64,
    #[serde(default = "default_critical_gap_hours")]
    pub critical_gap_hours: f64,
    #[serde(default = "default_critical_failures")]
    pub critical_consecutive_failures: u32,

    #[serde(default = "default_warning_success_rate")]
    pub warning_success_rate: f64,
    #[serde(default = "default_warning_confidence")]
    pub warning_confidence: f64,
    #[serde(default = "default_warning_gap_hours")]
    pub warning_gap_hours: f64,
    #[serde(default = "default_warning_failures")]
    pub warning_consecutive_failures: u32,
}

fn default_warning_success_rate() -> f64 {
    0.8
}
fn default_warning_confidence() -> f64 {
    0.7
}
fn default_warning_gap_hours() -> f64 {
    2.0
}
fn default_warning_failures() -> u32 {
    2
}

impl Default for AlertLevelThresholds {
    fn default() -> Self {
        Self {
            critical_success_rate: default_critical_success_rate(),
            critical_confidence: default_critical_confidence(),
            critical_gap_hours: default_critical_gap_hours(),
            critical_consecutive_failures: default_critical_failures(),
            warning_success_rate: default_warning_success_rate(),
            warning_confidence: default_warning_confidence(),
            warning_gap_hours: default_warning_gap_hours(),
            warning_consecutive_failures: default_warning_failures(),
        }
    }
}

fn check_ratio(name: &str, value: f64) -> CoreResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!("{name} must be within [0, 1], got {value}"),
        })
    }
}

fn check_hours(name: &str, value: f64) -> CoreResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!("{name} must be a positive number of hours, got {value}"),
        })
    }
}

impl HealthThresholds {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        if self.window_runs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "health.window_runs must be at least 1".to_string(),
            });
        }
        check_ratio("health.healthy_min_success_rate", self.healthy_min_success_rate)?;
        check_ratio("health.healthy_min_confidence", self.healthy_min_confidence)?;
        check_ratio("health.critical_success_rate", self.critical_success_rate)?;
        check_ratio("health.critical_confidence", self.critical_confidence)?;
        check_hours("health.healthy_max_gap_hours", self.healthy_max_gap_hours)?;
        check_hours("health.critical_gap_hours", self.critical_gap_hours)?;
        Ok(())
    }
}

impl AlertLevelThresholds {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        check_ratio("alert_levels.critical_success_rate", self.critical_success_rate)?;
        check_ratio("alert_levels.critical_confidence", self.critical_confidence)?;
        check_ratio("alert_levels.warning_success_rate", self.warning_success_rate)?;
        check_ratio("alert_levels.warning_confidence", self.warning_confidence)?;
        check_hours("alert_levels.critical_gap_hours", self.critical_gap_hours)?;
        check_hours("alert_levels.warning_gap_hours", self.warning_gap_hours)?;
        Ok(())
    }
}

/// Derive rolling metrics from a source's run history.
///
/// `recent` holds closed runs newest first. The gap is measured from the last
/// successful completion, or from the first run's start when the source has
/// never succeeded. Returns `None` when the source has no closed runs.
pub fn compute_metrics(
    recent: &[CollectionRun],
    last_success_at: Option<DateTime<Utc>>,
    first_started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window_runs: u32,
) -> Option<HealthMetrics> {
    if recent.is_empty() {
        return None;
    }

    let window: Vec<&CollectionRun> = recent.iter().take(window_runs.max(1) as usize).collect();
    let n = window.len() as f64;
    let success_rate = window.iter().map(|r| r.success_rate()).sum::<f64>() / n;
    let confidence = window.iter().map(|r| r.confidence_score).sum::<f64>() / n;

    let consecutive_failures = recent
        .iter()
        .take_while(|r| !r.status.is_successful())
        .count() as u32;

    let gap_hours = last_success_at
        .or(first_started_at)
        .map(|since| hours_between(since, now))
        .unwrap_or(0.0);

    Some(HealthMetrics {
        success_rate,
        confidence,
        gap_hours,
        consecutive_failures,
        runs_considered: window.len() as u32,
    })
}

/// Fractional hours from `since` to `now`, never negative.
pub fn hours_between(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - since).num_seconds() as f64 / 3600.0).max(0.0)
}

/// Classify health from metrics. `None` means no run was ever recorded.
pub fn classify_health(metrics: Option<&HealthMetrics>, t: &HealthThresholds) -> HealthStatus {
    let Some(m) = metrics else {
        return HealthStatus::Unknown;
    };

    if m.success_rate < t.critical_success_rate
        || m.confidence < t.critical_confidence
        || m.gap_hours >= t.critical_gap_hours
        || m.consecutive_failures >= t.critical_consecutive_failures
    {
        return HealthStatus::Critical;
    }

    if m.success_rate >= t.healthy_min_success_rate
        && m.confidence >= t.healthy_min_confidence
        && m.gap_hours < t.healthy_max_gap_hours
        && m.consecutive_failures < t.healthy_max_consecutive_failures
    {
        return HealthStatus::Healthy;
    }

    HealthStatus::Degraded
}

/// Classify the alert level from metrics. A source with no runs is `Normal`;
/// it has not produced anything to alert on yet.
pub fn classify_alert_level(metrics: Option<&HealthMetrics>, t: &AlertLevelThresholds) -> AlertLevel {
    let Some(m) = metrics else {
        return AlertLevel::Normal;
    };

    if m.success_rate < t.critical_success_rate
        || m.confidence < t.critical_confidence
        || m.gap_hours >= t.critical_gap_hours
        || m.consecutive_failures >= t.critical_consecutive_failures
    {
        AlertLevel::Critical
    } else if m.success_rate < t.warning_success_rate
        || m.confidence < t.warning_confidence
        || m.gap_hours >= t.warning_gap_hours
        || m.consecutive_failures >= t.warning_consecutive_failures
    {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

/// A point-in-time health classification of one source
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub source: SourceName,
    pub computed_at: DateTime<Utc>,
    pub metrics: Option<HealthMetrics>,
    pub status: HealthStatus,
    pub alert_level: AlertLevel,
}

impl HealthSnapshot {
    /// Classify `metrics` into a snapshot
    pub fn evaluate(
        source: SourceName,
        metrics: Option<HealthMetrics>,
        computed_at: DateTime<Utc>,
        health: &HealthThresholds,
        levels: &AlertLevelThresholds,
    ) -> Self {
        let status = classify_health(metrics.as_ref(), health);
        let alert_level = classify_alert_level(metrics.as_ref(), levels);
        Self {
            source,
            computed_at,
            metrics,
            status,
            alert_level,
        }
    }
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
