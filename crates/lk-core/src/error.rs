//! Error types for lk-core

use thiserror::Error;

/// Core error type for Linekeeper
#[derive(Error, Debug)]
pub enum CoreError {
    /// L001: Configuration file not found
    #[error("[L001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// L002: Failed to parse configuration file
    #[error("[L002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// L003: Invalid configuration value
    #[error("[L003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// L004: Argument outside its accepted range or shape
    #[error("[L004] Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// L005: Game identity without any external provider id
    #[error("[L005] Game identity '{canonical_id}' must carry at least one external id")]
    MissingExternalId { canonical_id: String },

    /// L006: Unknown enum label read from storage or user input
    #[error("[L006] Unknown {kind} '{value}'")]
    UnknownLabel { kind: &'static str, value: String },

    /// L007: Canonical game id registered twice
    #[error("[L007] Game identity '{canonical_id}' already exists")]
    DuplicateIdentity { canonical_id: String },

    /// L008: External id already mapped to a different canonical game
    #[error("[L008] {provider} id '{external_id}' is already mapped to '{existing}'")]
    IdentityConflict {
        provider: String,
        external_id: String,
        existing: String,
    },

    /// L009: IO error
    #[error("[L009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// L010: IO error with file path context
    #[error("[L010] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// L011: YAML parse error
    #[error("[L011] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for an [`CoreError::InvalidArgument`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Reject a score that falls outside `[0, 1]`.
///
/// Scores are never clamped on write; an out-of-range value points at an
/// upstream bug and must surface as an error.
pub fn ensure_unit_interval(name: &str, value: f64) -> CoreResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::invalid(
            name,
            format!("{value} is outside the range [0, 1]"),
        ))
    }
}
