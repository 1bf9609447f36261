//! Quality configuration store: named settings, version, and audit trail.
//!
//! The configuration version is the highest `config_version` in the audit
//! table, or 1 before the first change. Every write appends exactly one audit
//! row carrying the next version.

use crate::connection::MonitorDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{get_opt_ts, get_ts, ts};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lk_core::quality::{validate_setting, QualitySettings, SETTINGS};
use lk_core::CoreError;
use serde::Serialize;
use std::collections::HashMap;

/// A stored setting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySetting {
    pub name: String,
    pub value: f64,
    pub description: Option<String>,
    /// `None` until the setting is first changed
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: String,
}

/// One audited change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigChange {
    pub audit_id: i64,
    pub setting_name: String,
    pub old_value: Option<f64>,
    pub new_value: f64,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub config_version: i64,
}

fn map_setting(row: &duckdb::Row<'_>) -> duckdb::Result<QualitySetting> {
    Ok(QualitySetting {
        name: row.get(0)?,
        value: row.get(1)?,
        description: row.get(2)?,
        updated_at: get_opt_ts(row, 3)?,
        updated_by: row.get(4)?,
    })
}

fn map_change(row: &duckdb::Row<'_>) -> duckdb::Result<ConfigChange> {
    Ok(ConfigChange {
        audit_id: row.get(0)?,
        setting_name: row.get(1)?,
        old_value: row.get(2)?,
        new_value: row.get(3)?,
        changed_by: row.get(4)?,
        changed_at: get_ts(row, 5)?,
        config_version: row.get(6)?,
    })
}

const SETTING_COLUMNS: &str =
    "setting_name, setting_value, description, epoch_us(updated_at), updated_by";

const AUDIT_COLUMNS: &str = "audit_id, setting_name, old_value, new_value, changed_by, \
     epoch_us(changed_at), config_version";

/// Insert every known setting that is not stored yet. Existing values are
/// left untouched.
pub fn seed_defaults(conn: &Connection) -> MetaResult<()> {
    let mut seeded = 0;
    for def in SETTINGS {
        seeded += conn
            .execute(
                "INSERT INTO lk_meta.quality_config (setting_name, setting_value, description)
                 VALUES (?, ?, ?)
                 ON CONFLICT DO NOTHING",
                duckdb::params![def.name, def.default, def.description],
            )
            .map_err(|e| MetaError::MigrationError(format!("seed {}: {e}", def.name)))?;
    }
    if seeded > 0 {
        log::debug!("Seeded {seeded} quality settings");
    }
    Ok(())
}

/// Current configuration version.
pub fn config_version(conn: &Connection) -> MetaResult<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(config_version), 1) FROM lk_meta.quality_config_audit",
        [],
        |row| row.get(0),
    )
    .query_context("select config version")
}

/// Every stored setting, by name.
pub fn list_settings(conn: &Connection) -> MetaResult<Vec<QualitySetting>> {
    let sql = format!("SELECT {SETTING_COLUMNS} FROM lk_meta.quality_config ORDER BY setting_name");
    let mut stmt = conn.prepare(&sql).query_context("prepare quality_config")?;
    let rows = stmt
        .query_map([], map_setting)
        .query_context("query quality_config")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect quality_config")?;
    Ok(rows)
}

/// One stored setting.
pub fn get_setting(conn: &Connection, name: &str) -> MetaResult<Option<QualitySetting>> {
    let sql = format!("SELECT {SETTING_COLUMNS} FROM lk_meta.quality_config WHERE setting_name = ?");
    match conn.query_row(&sql, duckdb::params![name], map_setting) {
        Ok(setting) => Ok(Some(setting)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select quality setting: {e}"))),
    }
}

/// Read a versioned snapshot of all settings.
///
/// Misordered tier confidences are logged, not rejected.
pub fn load_settings(conn: &Connection) -> MetaResult<QualitySettings> {
    let version = config_version(conn)?;
    let values: HashMap<String, f64> = list_settings(conn)?
        .into_iter()
        .map(|s| (s.name, s.value))
        .collect();
    let settings = QualitySettings::from_values(version, &values)?;
    for warning in settings.ordering_warnings() {
        log::warn!("Quality settings v{version}: {warning}");
    }
    Ok(settings)
}

/// Change a setting, recording the change in the audit trail and bumping
/// the configuration version.
pub fn set_setting(
    db: &MonitorDb,
    name: &str,
    value: f64,
    changed_by: &str,
    now: DateTime<Utc>,
) -> MetaResult<ConfigChange> {
    validate_setting(name, value)?;
    let changed_by = changed_by.trim();
    if changed_by.is_empty() {
        return Err(CoreError::invalid("changed_by", "must not be blank").into());
    }

    let change = db.transaction(|conn| {
        let old_value = get_setting(conn, name)?.map(|s| s.value);
        let version = config_version(conn)? + 1;

        let updated = conn
            .execute(
                "UPDATE lk_meta.quality_config
                 SET setting_value = ?, updated_at = CAST(? AS TIMESTAMP), updated_by = ?
                 WHERE setting_name = ?",
                duckdb::params![value, ts(&now), changed_by, name],
            )
            .query_context("update quality setting")?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO lk_meta.quality_config
                     (setting_name, setting_value, updated_at, updated_by)
                 VALUES (?, ?, CAST(? AS TIMESTAMP), ?)",
                duckdb::params![name, value, ts(&now), changed_by],
            )
            .query_context("insert quality setting")?;
        }

        let audit_id: i64 = conn
            .query_row(
                "INSERT INTO lk_meta.quality_config_audit
                     (setting_name, old_value, new_value, changed_by, changed_at, config_version)
                 VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), ?)
                 RETURNING audit_id",
                duckdb::params![name, old_value, value, changed_by, ts(&now), version],
                |row| row.get(0),
            )
            .query_context("insert quality audit")?;

        Ok(ConfigChange {
            audit_id,
            setting_name: name.to_string(),
            old_value,
            new_value: value,
            changed_by: changed_by.to_string(),
            changed_at: now,
            config_version: version,
        })
    })?;

    log::info!(
        "Quality setting {name} changed from {} to {value} by {changed_by} (v{})",
        change
            .old_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unset".to_string()),
        change.config_version
    );
    // Reloading logs any tier confidences the change left out of order.
    load_settings(db.conn())?;
    Ok(change)
}

/// Audit trail, newest first, optionally for one setting.
pub fn audit_log(conn: &Connection, name: Option<&str>) -> MetaResult<Vec<ConfigChange>> {
    let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM lk_meta.quality_config_audit");
    let params: Vec<&str> = match name {
        Some(name) => {
            sql.push_str(" WHERE setting_name = ?");
            vec![name]
        }
        None => Vec::new(),
    };
    sql.push_str(" ORDER BY config_version DESC");

    let mut stmt = conn.prepare(&sql).query_context("prepare quality audit")?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), map_change)
        .query_context("query quality audit")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect quality audit")?;
    Ok(rows)
}

#[cfg(test)]
#[path = "quality_config_test.rs"]
mod tests;
