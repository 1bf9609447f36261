//! Configuration types and parsing for linekeeper.yml

use crate::alert::AlertConfig;
use crate::dead_tuple::DeadTupleConfig;
use crate::error::{CoreError, CoreResult};
use crate::gap::GapConfig;
use crate::health::{AlertLevelThresholds, HealthThresholds};
use crate::identity::IdentityConfig;
use crate::source_name::SourceName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "linekeeper.yml";

/// Environment variable overriding `database.path`
pub const DATABASE_ENV_VAR: &str = "LK_DATABASE";

/// Main configuration from linekeeper.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Deployment name, shown in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Monitoring database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Sources whose health is tracked even before their first run
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceName>,

    /// Health classification boundaries
    #[serde(default)]
    pub health: HealthThresholds,

    /// Alert level boundaries
    #[serde(default)]
    pub alert_levels: AlertLevelThresholds,

    #[serde(default)]
    pub gaps: GapConfig,

    #[serde(default)]
    pub dead_tuples: DeadTupleConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    /// Alert deduplication windows
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Periodic job cadence for `lk serve`
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Intervals and limits for the scheduled jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    #[serde(default = "default_gap_interval")]
    pub gap_interval_secs: u64,

    #[serde(default = "default_dead_tuple_interval")]
    pub dead_tuple_interval_secs: u64,

    /// Upper bound on a single job run
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            gap_interval_secs: default_gap_interval(),
            dead_tuple_interval_secs: default_dead_tuple_interval(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

fn default_name() -> String {
    "linekeeper".to_string()
}

fn default_db_path() -> String {
    "linekeeper.duckdb".to_string()
}

fn default_sources() -> Vec<SourceName> {
    ["action_network", "vsin", "sbd", "mlb_stats_api"]
        .iter()
        .filter_map(|s| SourceName::parse(s).ok())
        .collect()
}

fn default_health_interval() -> u64 {
    300
}

fn default_gap_interval() -> u64 {
    900
}

fn default_dead_tuple_interval() -> u64 {
    3600
}

fn default_job_timeout() -> u64 {
    180
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            database: DatabaseConfig::default(),
            sources: default_sources(),
            health: HealthThresholds::default(),
            alert_levels: AlertLevelThresholds::default(),
            gaps: GapConfig::default(),
            dead_tuples: DeadTupleConfig::default(),
            identity: IdentityConfig::default(),
            alerts: AlertConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory
    /// Looks for linekeeper.yml or linekeeper.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join(CONFIG_FILE_NAME);
        let yaml_path = dir.join("linekeeper.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "name cannot be empty".to_string(),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.as_str()) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("source '{source}' is listed more than once"),
                });
            }
        }

        self.health.validate()?;
        self.alert_levels.validate()?;
        self.gaps.validate()?;
        self.dead_tuples.validate()?;
        self.identity.validate()?;
        self.alerts.validate()?;

        let intervals = [
            ("scheduler.health_interval_secs", self.scheduler.health_interval_secs),
            ("scheduler.gap_interval_secs", self.scheduler.gap_interval_secs),
            ("scheduler.dead_tuple_interval_secs", self.scheduler.dead_tuple_interval_secs),
            ("scheduler.job_timeout_secs", self.scheduler.job_timeout_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{name} must be positive"),
                });
            }
        }
        Ok(())
    }

    /// Resolve the database path: `--database` flag, then `LK_DATABASE`,
    /// then the file.
    pub fn resolve_database_path(&self, cli_override: Option<&str>) -> String {
        let env = std::env::var(DATABASE_ENV_VAR).ok();
        pick_database_path(cli_override, env.as_deref(), &self.database.path)
    }

    /// Database path as a filesystem path relative to `root`, or `None` for
    /// an in-memory database.
    pub fn database_file(&self, root: &Path, cli_override: Option<&str>) -> Option<PathBuf> {
        let path = self.resolve_database_path(cli_override);
        if path == ":memory:" {
            return None;
        }
        let path = PathBuf::from(path);
        Some(if path.is_absolute() { path } else { root.join(path) })
    }

    /// Rendered YAML of the default configuration, written by `lk init`.
    pub fn default_yaml() -> CoreResult<String> {
        Ok(serde_yaml::to_string(&Self::default())?)
    }
}

pub(crate) fn pick_database_path(
    cli_override: Option<&str>,
    env: Option<&str>,
    file: &str,
) -> String {
    cli_override
        .or(env)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(file)
        .to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
