//! Alert persistence with cooldown deduplication.
//!
//! The dedup check and the insert must run in the same transaction; callers
//! that already hold one use [`raise_alert`], everyone else [`raise`].

use crate::connection::MonitorDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{get_opt_ts, get_parsed, get_ts, ts};
use chrono::{DateTime, Duration, Utc};
use duckdb::Connection;
use lk_core::alert::{is_duplicate, Alert, AlertConfig, AlertKind, NewAlert, Severity};

const ALERT_COLUMNS: &str = "alert_id, source, kind, severity, message, epoch_us(created_at), \
     epoch_us(acknowledged_at), acknowledged_by, epoch_us(resolved_at)";

fn map_alert(row: &duckdb::Row<'_>) -> duckdb::Result<Alert> {
    Ok(Alert {
        alert_id: row.get(0)?,
        source: row.get(1)?,
        kind: get_parsed(row, 2, AlertKind::parse)?,
        severity: get_parsed(row, 3, Severity::parse)?,
        message: row.get(4)?,
        created_at: get_ts(row, 5)?,
        acknowledged_at: get_opt_ts(row, 6)?,
        acknowledged_by: row.get(7)?,
        resolved_at: get_opt_ts(row, 8)?,
    })
}

/// The newest unresolved alert for (source, kind): id, creation time and
/// severity.
fn latest_active(
    conn: &Connection,
    source: &str,
    kind: AlertKind,
) -> MetaResult<Option<(i64, DateTime<Utc>, Severity)>> {
    match conn.query_row(
        "SELECT alert_id, epoch_us(created_at), severity FROM lk_meta.alerts
         WHERE source = ? AND kind = ? AND resolved_at IS NULL
         ORDER BY created_at DESC, alert_id DESC
         LIMIT 1",
        duckdb::params![source, kind.as_str()],
        |row| Ok((row.get(0)?, get_ts(row, 1)?, get_parsed(row, 2, Severity::parse)?)),
    ) {
        Ok(active) => Ok(Some(active)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select latest active alert: {e}"))),
    }
}

/// Insert `alert` unless an unresolved alert for the same (source, kind) was
/// raised within `cooldown`. A suppressed alert that is more severe than the
/// active one escalates it in place: severity and message are replaced and
/// no second row is written.
///
/// Returns the id of the inserted or escalated alert, or `None` when the
/// alert was suppressed.
///
/// Must be called inside a transaction.
pub fn raise_alert(
    conn: &Connection,
    alert: &NewAlert,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> MetaResult<Option<i64>> {
    let active = latest_active(conn, &alert.source, alert.kind)?;
    if let Some((active_id, created_at, severity)) = active {
        if is_duplicate(Some(created_at), now, cooldown) {
            if alert.severity <= severity {
                log::debug!(
                    "Suppressed duplicate {} alert for {}",
                    alert.kind,
                    alert.source
                );
                return Ok(None);
            }
            conn.execute(
                "UPDATE lk_meta.alerts SET severity = ?, message = ? WHERE alert_id = ?",
                duckdb::params![alert.severity.as_str(), alert.message, active_id],
            )
            .query_context("escalate alert")?;
            log::info!(
                "Escalated {} alert #{active_id} for {} from {severity} to {}: {}",
                alert.kind,
                alert.source,
                alert.severity,
                alert.message
            );
            return Ok(Some(active_id));
        }
    }

    let alert_id: i64 = conn
        .query_row(
            "INSERT INTO lk_meta.alerts (source, kind, severity, message, created_at)
             VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP))
             RETURNING alert_id",
            duckdb::params![
                alert.source,
                alert.kind.as_str(),
                alert.severity.as_str(),
                alert.message,
                ts(&now),
            ],
            |row| row.get(0),
        )
        .query_context("insert alert")?;
    log::info!(
        "Raised {} {} alert #{alert_id} for {}: {}",
        alert.severity,
        alert.kind,
        alert.source,
        alert.message
    );
    Ok(Some(alert_id))
}

/// Raise an alert in its own transaction using the configured cooldown.
pub fn raise(
    db: &MonitorDb,
    alert: &NewAlert,
    cfg: &AlertConfig,
    now: DateTime<Utc>,
) -> MetaResult<Option<i64>> {
    db.transaction(|conn| raise_alert(conn, alert, cfg.cooldown(alert.kind), now))
}

/// Resolve every unresolved alert for (source, kind). Returns how many were
/// resolved.
pub fn resolve_active(
    conn: &Connection,
    source: &str,
    kind: AlertKind,
    now: DateTime<Utc>,
) -> MetaResult<usize> {
    conn.execute(
        "UPDATE lk_meta.alerts SET resolved_at = CAST(? AS TIMESTAMP)
         WHERE source = ? AND kind = ? AND resolved_at IS NULL",
        duckdb::params![ts(&now), source, kind.as_str()],
    )
    .query_context("resolve active alerts")
}

/// Fetch one alert.
pub fn get_alert(conn: &Connection, alert_id: i64) -> MetaResult<Option<Alert>> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM lk_meta.alerts WHERE alert_id = ?");
    match conn.query_row(&sql, duckdb::params![alert_id], map_alert) {
        Ok(alert) => Ok(Some(alert)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select alert: {e}"))),
    }
}

fn require_alert(conn: &Connection, alert_id: i64) -> MetaResult<Alert> {
    get_alert(conn, alert_id)?.ok_or_else(|| MetaError::NotFound {
        entity: "alert",
        key: alert_id.to_string(),
    })
}

/// Filter for [`list_alerts`].
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub source: Option<String>,
    pub kind: Option<AlertKind>,
    /// Include resolved alerts
    pub include_resolved: bool,
}

/// List alerts, newest first.
pub fn list_alerts(conn: &Connection, filter: &AlertFilter) -> MetaResult<Vec<Alert>> {
    let mut sql = format!("SELECT {ALERT_COLUMNS} FROM lk_meta.alerts WHERE 1 = 1");
    let mut params: Vec<String> = Vec::new();
    if let Some(source) = &filter.source {
        sql.push_str(" AND source = ?");
        params.push(source.clone());
    }
    if let Some(kind) = filter.kind {
        sql.push_str(" AND kind = ?");
        params.push(kind.as_str().to_string());
    }
    if !filter.include_resolved {
        sql.push_str(" AND resolved_at IS NULL");
    }
    sql.push_str(" ORDER BY created_at DESC, alert_id DESC");

    let mut stmt = conn.prepare(&sql).query_context("prepare list alerts")?;
    let alerts = stmt
        .query_map(duckdb::params_from_iter(params.iter()), map_alert)
        .query_context("query alerts")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect alerts")?;
    Ok(alerts)
}

/// Acknowledge an alert. Acknowledging keeps the alert active.
pub fn acknowledge(
    db: &MonitorDb,
    alert_id: i64,
    by: &str,
    now: DateTime<Utc>,
) -> MetaResult<Alert> {
    let by = by.trim();
    if by.is_empty() {
        return Err(lk_core::CoreError::invalid("acknowledged_by", "must not be blank").into());
    }
    db.transaction(|conn| {
        require_alert(conn, alert_id)?;
        conn.execute(
            "UPDATE lk_meta.alerts
             SET acknowledged_at = CAST(? AS TIMESTAMP), acknowledged_by = ?
             WHERE alert_id = ?",
            duckdb::params![ts(&now), by, alert_id],
        )
        .query_context("acknowledge alert")?;
        require_alert(conn, alert_id)
    })
}

/// Resolve an alert. Resolving an already resolved alert keeps its original
/// resolution time.
pub fn resolve(db: &MonitorDb, alert_id: i64, now: DateTime<Utc>) -> MetaResult<Alert> {
    db.transaction(|conn| {
        let alert = require_alert(conn, alert_id)?;
        if !alert.is_active() {
            return Ok(alert);
        }
        conn.execute(
            "UPDATE lk_meta.alerts SET resolved_at = CAST(? AS TIMESTAMP) WHERE alert_id = ?",
            duckdb::params![ts(&now), alert_id],
        )
        .query_context("resolve alert")?;
        require_alert(conn, alert_id)
    })
}

#[cfg(test)]
#[path = "alerts_test.rs"]
mod tests;
