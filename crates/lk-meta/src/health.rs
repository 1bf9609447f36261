//! Health snapshots: history, current state, and degradation alerts.
//!
//! Each refresh appends to `health_snapshots` and replaces the source's row in
//! `health_current` in the same transaction, so readers of the current table
//! never see a snapshot that is missing from history.

use crate::alerts::{raise_alert, resolve_active};
use crate::collection::{first_started_at, known_sources, last_success_at, recent_runs};
use crate::connection::MonitorDb;
use crate::error::{MetaResult, MetaResultExt};
use crate::row_helpers::{get_parsed, get_ts, ts};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lk_core::alert::{AlertConfig, AlertKind, NewAlert, Severity};
use lk_core::health::{
    compute_metrics, AlertLevel, AlertLevelThresholds, HealthMetrics, HealthSnapshot, HealthStatus,
    HealthThresholds,
};
use lk_core::SourceName;
use serde::Serialize;

/// Runs read per source; enough to count long failure streaks.
const HISTORY_LIMIT: usize = 100;

const SNAPSHOT_COLUMNS: &str = "source, epoch_us(computed_at), success_rate, confidence, \
     gap_hours, consecutive_failures, runs_considered, status, alert_level";

fn map_snapshot(row: &duckdb::Row<'_>) -> duckdb::Result<HealthSnapshot> {
    let success_rate: Option<f64> = row.get(2)?;
    let metrics = match success_rate {
        Some(success_rate) => Some(HealthMetrics {
            success_rate,
            confidence: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
            gap_hours: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
            consecutive_failures: row.get::<_, Option<i64>>(5)?.unwrap_or_default().max(0) as u32,
            runs_considered: row.get::<_, Option<i64>>(6)?.unwrap_or_default().max(0) as u32,
        }),
        None => None,
    };
    Ok(HealthSnapshot {
        source: get_parsed(row, 0, SourceName::parse)?,
        computed_at: get_ts(row, 1)?,
        metrics,
        status: get_parsed(row, 7, HealthStatus::parse)?,
        alert_level: get_parsed(row, 8, AlertLevel::parse)?,
    })
}

/// Thresholds used by a refresh
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy<'a> {
    pub health: &'a HealthThresholds,
    pub levels: &'a AlertLevelThresholds,
    pub alerts: &'a AlertConfig,
}

/// A status change observed during a refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTransition {
    pub source: SourceName,
    pub from: HealthStatus,
    pub to: HealthStatus,
}

/// What one refresh did
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthRefresh {
    pub snapshots: Vec<HealthSnapshot>,
    pub transitions: Vec<StatusTransition>,
    pub alerts_raised: usize,
    pub alerts_resolved: usize,
}

fn insert_snapshot(conn: &Connection, table: &str, snapshot: &HealthSnapshot) -> MetaResult<()> {
    let m = snapshot.metrics.as_ref();
    conn.execute(
        &format!(
            "INSERT INTO lk_meta.{table} (source, computed_at, success_rate, confidence,
                 gap_hours, consecutive_failures, runs_considered, status, alert_level)
             VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?)"
        ),
        duckdb::params![
            snapshot.source.as_str(),
            ts(&snapshot.computed_at),
            m.map(|m| m.success_rate),
            m.map(|m| m.confidence),
            m.map(|m| m.gap_hours),
            m.map(|m| i64::from(m.consecutive_failures)),
            m.map(|m| i64::from(m.runs_considered)),
            snapshot.status.as_str(),
            snapshot.alert_level.as_str(),
        ],
    )
    .query_context(&format!("insert {table}"))?;
    Ok(())
}

fn write_snapshot(conn: &Connection, snapshot: &HealthSnapshot) -> MetaResult<()> {
    insert_snapshot(conn, "health_snapshots", snapshot)?;

    let m = snapshot.metrics.as_ref();
    let updated = conn
        .execute(
            "UPDATE lk_meta.health_current SET computed_at = CAST(? AS TIMESTAMP),
                 success_rate = ?, confidence = ?, gap_hours = ?, consecutive_failures = ?,
                 runs_considered = ?, status = ?, alert_level = ?
             WHERE source = ?",
            duckdb::params![
                ts(&snapshot.computed_at),
                m.map(|m| m.success_rate),
                m.map(|m| m.confidence),
                m.map(|m| m.gap_hours),
                m.map(|m| i64::from(m.consecutive_failures)),
                m.map(|m| i64::from(m.runs_considered)),
                snapshot.status.as_str(),
                snapshot.alert_level.as_str(),
                snapshot.source.as_str(),
            ],
        )
        .query_context("update health_current")?;
    if updated == 0 {
        insert_snapshot(conn, "health_current", snapshot)?;
    }
    Ok(())
}

fn current_status(conn: &Connection, source: &SourceName) -> MetaResult<Option<HealthStatus>> {
    Ok(current_health(conn, Some(source))?
        .into_iter()
        .next()
        .map(|s| s.status))
}

fn degradation_alert(snapshot: &HealthSnapshot) -> Option<NewAlert> {
    let severity = match snapshot.alert_level {
        AlertLevel::Normal => return None,
        AlertLevel::Warning => Severity::Warning,
        AlertLevel::Critical => Severity::Critical,
    };
    let detail = snapshot
        .metrics
        .as_ref()
        .map(|m| {
            format!(
                "success rate {:.2}, confidence {:.2}, {:.1}h since last success, {} consecutive failures",
                m.success_rate, m.confidence, m.gap_hours, m.consecutive_failures
            )
        })
        .unwrap_or_default();
    Some(NewAlert::new(
        snapshot.source.as_str(),
        AlertKind::Degradation,
        severity,
        format!("{} is {} ({detail})", snapshot.source, snapshot.status),
    ))
}

fn refresh_source(
    conn: &Connection,
    source: &SourceName,
    policy: HealthPolicy<'_>,
    now: DateTime<Utc>,
    refresh: &mut HealthRefresh,
) -> MetaResult<()> {
    let previous = current_status(conn, source)?;

    let limit = HISTORY_LIMIT.max(policy.health.window_runs as usize);
    let runs = recent_runs(conn, source, limit)?;
    let metrics = compute_metrics(
        &runs,
        last_success_at(conn, source)?,
        first_started_at(conn, source)?,
        now,
        policy.health.window_runs,
    );
    let snapshot = HealthSnapshot::evaluate(source.clone(), metrics, now, policy.health, policy.levels);
    write_snapshot(conn, &snapshot)?;

    let from = previous.unwrap_or(HealthStatus::Unknown);
    if from != snapshot.status {
        log::info!("{source} health changed: {from} -> {}", snapshot.status);
        refresh.transitions.push(StatusTransition {
            source: source.clone(),
            from,
            to: snapshot.status,
        });
    }

    match degradation_alert(&snapshot) {
        Some(alert) => {
            let cooldown = policy.alerts.cooldown(AlertKind::Degradation);
            if raise_alert(conn, &alert, cooldown, now)?.is_some() {
                refresh.alerts_raised += 1;
            }
        }
        None => {
            refresh.alerts_resolved +=
                resolve_active(conn, source.as_str(), AlertKind::Degradation, now)?;
        }
    }

    refresh.snapshots.push(snapshot);
    Ok(())
}

/// Recompute health for every configured source and every source with runs.
///
/// Sources are processed one at a time inside a single transaction, so a
/// failing source or a missed deadline leaves no snapshot or alert from the
/// sweep behind.
pub fn refresh_health(
    db: &MonitorDb,
    configured: &[SourceName],
    policy: HealthPolicy<'_>,
    now: DateTime<Utc>,
) -> MetaResult<HealthRefresh> {
    let refresh = db.transaction(|conn| {
        let mut refresh = HealthRefresh::default();
        for source in known_sources(conn, configured)? {
            refresh_source(conn, &source, policy, now, &mut refresh).map_err(|e| {
                log::warn!("Health refresh failed for {source}: {e}");
                e
            })?;
        }
        Ok(refresh)
    })?;
    Ok(refresh)
}

/// Current snapshot per source, optionally for one source only.
pub fn current_health(conn: &Connection, source: Option<&SourceName>) -> MetaResult<Vec<HealthSnapshot>> {
    let mut sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM lk_meta.health_current");
    let params: Vec<&str> = match source {
        Some(s) => {
            sql.push_str(" WHERE source = ?");
            vec![s.as_str()]
        }
        None => Vec::new(),
    };
    sql.push_str(" ORDER BY source");

    let mut stmt = conn.prepare(&sql).query_context("prepare health_current")?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), map_snapshot)
        .query_context("query health_current")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect health_current")?;
    Ok(rows)
}

/// Snapshot history for one source, newest first.
pub fn health_history(
    conn: &Connection,
    source: &SourceName,
    limit: usize,
) -> MetaResult<Vec<HealthSnapshot>> {
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM lk_meta.health_snapshots
         WHERE source = ? ORDER BY computed_at DESC, snapshot_id DESC LIMIT {limit}"
    );
    let mut stmt = conn.prepare(&sql).query_context("prepare health_snapshots")?;
    let rows = stmt
        .query_map(duckdb::params![source.as_str()], map_snapshot)
        .query_context("query health_snapshots")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect health_snapshots")?;
    Ok(rows)
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
