//! Alert types and de-duplication policy

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A source stopped producing successful collections
    Gap,
    /// A table crossed the dead-tuple ratio threshold
    DeadTuple,
    /// Model or feature drift reported by the ML monitoring layer
    Drift,
    /// Source health dropped to warning or critical
    Degradation,
}

impl AlertKind {
    /// Storage label
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Gap => "gap",
            AlertKind::DeadTuple => "dead_tuple",
            AlertKind::Drift => "drift",
            AlertKind::Degradation => "degradation",
        }
    }

    /// Parse a storage label
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "gap" => Ok(AlertKind::Gap),
            "dead_tuple" => Ok(AlertKind::DeadTuple),
            "drift" => Ok(AlertKind::Drift),
            "degradation" => Ok(AlertKind::Degradation),
            other => Err(CoreError::UnknownLabel {
                kind: "alert kind",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Storage label
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Parse a storage label
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(CoreError::UnknownLabel {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    /// Source name, or `schema.table` for dead-tuple alerts
    pub source: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

impl NewAlert {
    /// Build a new alert
    pub fn new(
        source: impl Into<String>,
        kind: AlertKind,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            kind,
            severity,
            message: message.into(),
        }
    }
}

/// A persisted alert with its lifecycle timestamps
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_id: i64,
    pub source: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// An alert is active until it is resolved. Acknowledging does not
    /// deactivate it.
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Cooldown windows per alert kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Cooldown for `degradation` alerts (minutes)
    #[serde(default = "default_degradation_cooldown")]
    pub degradation_cooldown_minutes: i64,

    /// Cooldown for `gap` alerts (minutes)
    #[serde(default = "default_gap_cooldown")]
    pub gap_cooldown_minutes: i64,

    /// Cooldown for `dead_tuple` alerts (minutes)
    #[serde(default = "default_dead_tuple_cooldown")]
    pub dead_tuple_cooldown_minutes: i64,

    /// Cooldown for `drift` alerts (minutes)
    #[serde(default = "default_drift_cooldown")]
    pub drift_cooldown_minutes: i64,
}

fn default_degradation_cooldown() -> i64 {
    60
}

fn default_gap_cooldown() -> i64 {
    60
}

fn default_dead_tuple_cooldown() -> i64 {
    120
}

fn default_drift_cooldown() -> i64 {
    60
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            degradation_cooldown_minutes: default_degradation_cooldown(),
            gap_cooldown_minutes: default_gap_cooldown(),
            dead_tuple_cooldown_minutes: default_dead_tuple_cooldown(),
            drift_cooldown_minutes: default_drift_cooldown(),
        }
    }
}

impl AlertConfig {
    /// Cooldown window for a kind
    pub fn cooldown(&self, kind: AlertKind) -> Duration {
        let minutes = match kind {
            AlertKind::Degradation => self.degradation_cooldown_minutes,
            AlertKind::Gap => self.gap_cooldown_minutes,
            AlertKind::DeadTuple => self.dead_tuple_cooldown_minutes,
            AlertKind::Drift => self.drift_cooldown_minutes,
        };
        Duration::minutes(minutes)
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        let windows = [
            ("alerts.degradation_cooldown_minutes", self.degradation_cooldown_minutes),
            ("alerts.gap_cooldown_minutes", self.gap_cooldown_minutes),
            ("alerts.dead_tuple_cooldown_minutes", self.dead_tuple_cooldown_minutes),
            ("alerts.drift_cooldown_minutes", self.drift_cooldown_minutes),
        ];
        for (name, minutes) in windows {
            if minutes <= 0 {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{name} must be positive, got {minutes}"),
                });
            }
        }
        Ok(())
    }
}

/// Decide whether a new alert duplicates an active one.
///
/// `latest_active_created_at` is the creation time of the newest unresolved
/// alert with the same (source, kind). The new alert is a duplicate when that
/// alert was raised inside the cooldown window ending at `now`.
pub fn is_duplicate(
    latest_active_created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    match latest_active_created_at {
        Some(created_at) => now - created_at < cooldown,
        None => false,
    }
}

#[cfg(test)]
#[path = "alert_test.rs"]
mod tests;
