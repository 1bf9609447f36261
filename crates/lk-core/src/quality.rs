//! Game data-quality scoring
//!
//! A game's tier depends only on which fields are present. The confidence
//! attached to each tier comes from [`QualitySettings`], a versioned snapshot
//! of the named settings held in the quality configuration store.

use crate::error::{ensure_unit_interval, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discrete quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "HIGH",
            QualityTier::Medium => "MEDIUM",
            QualityTier::Low => "LOW",
            QualityTier::Minimal => "MINIMAL",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "HIGH" => Ok(QualityTier::High),
            "MEDIUM" => Ok(QualityTier::Medium),
            "LOW" => Ok(QualityTier::Low),
            "MINIMAL" => Ok(QualityTier::Minimal),
            other => Err(CoreError::UnknownLabel {
                kind: "quality tier",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a curated game that drive its quality tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameFields {
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl GameFields {
    fn has_scores(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }
}

/// Tier and confidence assigned to a game
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScore {
    pub tier: QualityTier,
    pub confidence: f64,
}

/// Score a game. Missing or blank fields lower the tier; they never fail.
pub fn score_game(game: &GameFields, settings: &QualitySettings) -> QualityScore {
    let tier = match (game.has_scores(), present(&game.external_id), present(&game.venue)) {
        (true, true, true) => QualityTier::High,
        (true, true, false) => QualityTier::Medium,
        (true, false, _) => QualityTier::Low,
        (false, _, _) => QualityTier::Minimal,
    };
    QualityScore {
        tier,
        confidence: settings.confidence_for(tier),
    }
}

/// Kind of value a named setting holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// A score within `[0, 1]`
    Confidence,
    /// A whole number greater than zero
    PositiveInteger,
}

/// Definition of a named quality setting
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub name: &'static str,
    pub kind: SettingKind,
    pub default: f64,
    pub description: &'static str,
}

pub const HIGH_CONFIDENCE_SCORE: &str = "high_confidence_score";
pub const MEDIUM_CONFIDENCE_SCORE: &str = "medium_confidence_score";
pub const LOW_CONFIDENCE_SCORE: &str = "low_confidence_score";
pub const MINIMAL_CONFIDENCE_SCORE: &str = "minimal_confidence_score";
pub const SCORING_WINDOW_MINUTES: &str = "scoring_window_minutes";
pub const DEFAULT_BATCH_SIZE: &str = "default_batch_size";
pub const MAX_BATCH_SIZE: &str = "max_batch_size";

/// Every known setting with its default value
pub const SETTINGS: &[SettingDef] = &[
    SettingDef {
        name: HIGH_CONFIDENCE_SCORE,
        kind: SettingKind::Confidence,
        default: 0.95,
        description: "Confidence for games with scores, external id and venue",
    },
    SettingDef {
        name: MEDIUM_CONFIDENCE_SCORE,
        kind: SettingKind::Confidence,
        default: 0.75,
        description: "Confidence for games with scores and external id",
    },
    SettingDef {
        name: LOW_CONFIDENCE_SCORE,
        kind: SettingKind::Confidence,
        default: 0.50,
        description: "Confidence for games with scores only",
    },
    SettingDef {
        name: MINIMAL_CONFIDENCE_SCORE,
        kind: SettingKind::Confidence,
        default: 0.25,
        description: "Confidence for games missing scores",
    },
    SettingDef {
        name: SCORING_WINDOW_MINUTES,
        kind: SettingKind::PositiveInteger,
        default: 60.0,
        description: "Only games updated within this many minutes are rescored",
    },
    SettingDef {
        name: DEFAULT_BATCH_SIZE,
        kind: SettingKind::PositiveInteger,
        default: 1000.0,
        description: "Batch size used when none is given",
    },
    SettingDef {
        name: MAX_BATCH_SIZE,
        kind: SettingKind::PositiveInteger,
        default: 5000.0,
        description: "Upper bound accepted for a batch size",
    },
];

/// Look up a setting definition by name
pub fn setting_def(name: &str) -> Option<&'static SettingDef> {
    SETTINGS.iter().find(|d| d.name == name)
}

/// Validate a value for a named setting before it is written.
pub fn validate_setting(name: &str, value: f64) -> CoreResult<()> {
    let def = setting_def(name).ok_or_else(|| {
        CoreError::invalid(
            "setting",
            format!(
                "unknown setting '{name}'. Known settings: {}",
                SETTINGS.iter().map(|d| d.name).collect::<Vec<_>>().join(", ")
            ),
        )
    })?;
    match def.kind {
        SettingKind::Confidence => ensure_unit_interval(name, value).map(|_| ()),
        SettingKind::PositiveInteger => {
            if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
                Ok(())
            } else {
                Err(CoreError::invalid(
                    name,
                    format!("{value} is not a positive whole number"),
                ))
            }
        }
    }
}

/// Versioned snapshot of the quality settings used by one scoring run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySettings {
    /// Configuration version the snapshot was read at
    pub version: i64,
    pub high_confidence_score: f64,
    pub medium_confidence_score: f64,
    pub low_confidence_score: f64,
    pub minimal_confidence_score: f64,
    pub scoring_window_minutes: i64,
    pub default_batch_size: i64,
    pub max_batch_size: i64,
}

fn default_value(name: &str) -> f64 {
    setting_def(name).map(|d| d.default).unwrap_or_default()
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            version: 0,
            high_confidence_score: default_value(HIGH_CONFIDENCE_SCORE),
            medium_confidence_score: default_value(MEDIUM_CONFIDENCE_SCORE),
            low_confidence_score: default_value(LOW_CONFIDENCE_SCORE),
            minimal_confidence_score: default_value(MINIMAL_CONFIDENCE_SCORE),
            scoring_window_minutes: default_value(SCORING_WINDOW_MINUTES) as i64,
            default_batch_size: default_value(DEFAULT_BATCH_SIZE) as i64,
            max_batch_size: default_value(MAX_BATCH_SIZE) as i64,
        }
    }
}

impl QualitySettings {
    /// Build a snapshot from stored values; missing names fall back to their
    /// defaults.
    pub fn from_values(version: i64, values: &HashMap<String, f64>) -> CoreResult<Self> {
        let get = |name: &str| -> CoreResult<f64> {
            let value = values.get(name).copied().unwrap_or_else(|| default_value(name));
            validate_setting(name, value)?;
            Ok(value)
        };
        Ok(Self {
            version,
            high_confidence_score: get(HIGH_CONFIDENCE_SCORE)?,
            medium_confidence_score: get(MEDIUM_CONFIDENCE_SCORE)?,
            low_confidence_score: get(LOW_CONFIDENCE_SCORE)?,
            minimal_confidence_score: get(MINIMAL_CONFIDENCE_SCORE)?,
            scoring_window_minutes: get(SCORING_WINDOW_MINUTES)? as i64,
            default_batch_size: get(DEFAULT_BATCH_SIZE)? as i64,
            max_batch_size: get(MAX_BATCH_SIZE)? as i64,
        })
    }

    /// Confidence configured for a tier
    pub fn confidence_for(&self, tier: QualityTier) -> f64 {
        match tier {
            QualityTier::High => self.high_confidence_score,
            QualityTier::Medium => self.medium_confidence_score,
            QualityTier::Low => self.low_confidence_score,
            QualityTier::Minimal => self.minimal_confidence_score,
        }
    }

    /// Describe tier confidences that are out of order.
    ///
    /// The ordering minimal <= low <= medium <= high is expected but not
    /// enforced; callers log these so a misconfiguration is visible.
    pub fn ordering_warnings(&self) -> Vec<String> {
        let pairs = [
            (MINIMAL_CONFIDENCE_SCORE, self.minimal_confidence_score, LOW_CONFIDENCE_SCORE, self.low_confidence_score),
            (LOW_CONFIDENCE_SCORE, self.low_confidence_score, MEDIUM_CONFIDENCE_SCORE, self.medium_confidence_score),
            (MEDIUM_CONFIDENCE_SCORE, self.medium_confidence_score, HIGH_CONFIDENCE_SCORE, self.high_confidence_score),
        ];
        pairs
            .iter()
            .filter(|(_, lower, _, upper)| lower > upper)
            .map(|(lo_name, lower, hi_name, upper)| {
                format!("{lo_name} ({lower}) is greater than {hi_name} ({upper})")
            })
            .collect()
    }

    /// Check a single-pass limit.
    pub fn validate_limit(limit: i64) -> CoreResult<()> {
        if limit <= 0 {
            return Err(CoreError::invalid(
                "limit",
                format!("must be a positive integer, got {limit}"),
            ));
        }
        Ok(())
    }

    /// Check batch arguments against this snapshot.
    pub fn validate_batch(&self, batch_size: i64, total_limit: i64) -> CoreResult<()> {
        if batch_size <= 0 {
            return Err(CoreError::invalid(
                "batch_size",
                format!("must be a positive integer, got {batch_size}"),
            ));
        }
        if batch_size > self.max_batch_size {
            return Err(CoreError::invalid(
                "batch_size",
                format!("{batch_size} exceeds the maximum of {}", self.max_batch_size),
            ));
        }
        if total_limit <= 0 {
            return Err(CoreError::invalid(
                "total_limit",
                format!("must be a positive integer, got {total_limit}"),
            ));
        }
        Ok(())
    }
}

/// Size of the next batch, or `None` once the total limit is reached.
pub fn next_batch_len(batch_size: i64, total_limit: i64, processed: i64) -> Option<i64> {
    let remaining = total_limit - processed;
    (remaining > 0).then(|| batch_size.min(remaining))
}

/// Outcome of one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub batch_number: u32,
    pub updated: i64,
    pub cumulative: i64,
}

/// Outcome of a batched scoring run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub settings_version: i64,
    pub batches: Vec<BatchResult>,
    pub total_updated: i64,
}

#[cfg(test)]
#[path = "quality_test.rs"]
mod tests;
