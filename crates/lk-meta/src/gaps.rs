//! Data gap detection and persistence.

use crate::alerts::raise_alert;
use crate::collection::{first_started_at, last_success_at, valid_records_between};
use crate::connection::MonitorDb;
use crate::error::{MetaResult, MetaResultExt};
use crate::row_helpers::{count_param, get_count, get_opt_ts, get_parsed, get_ts, ts};
use chrono::{DateTime, Duration, Utc};
use duckdb::Connection;
use lk_core::alert::{AlertConfig, AlertKind, NewAlert};
use lk_core::gap::{evaluate_gap, gap_alert_severity, BusinessImpact, Gap, GapConfig, GapDecision};
use lk_core::health::hours_between;
use lk_core::SourceName;
use serde::Serialize;

const GAP_COLUMNS: &str = "gap_id, source, epoch_us(gap_start), epoch_us(gap_end), gap_hours, \
     estimated_missing_records, business_impact, epoch_us(detected_at), epoch_us(updated_at)";

fn map_gap(row: &duckdb::Row<'_>) -> duckdb::Result<Gap> {
    Ok(Gap {
        gap_id: row.get(0)?,
        source: get_parsed(row, 1, SourceName::parse)?,
        gap_start: get_ts(row, 2)?,
        gap_end: get_opt_ts(row, 3)?,
        gap_hours: row.get(4)?,
        estimated_missing_records: get_count(row, 5)?,
        business_impact: get_parsed(row, 6, BusinessImpact::parse)?,
        detected_at: get_ts(row, 7)?,
        updated_at: get_ts(row, 8)?,
    })
}

fn query_gaps(conn: &Connection, sql: &str, params: &[&dyn duckdb::ToSql]) -> MetaResult<Vec<Gap>> {
    let mut stmt = conn.prepare(sql).query_context("prepare gaps")?;
    let gaps = stmt
        .query_map(params, map_gap)
        .query_context("query gaps")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect gaps")?;
    Ok(gaps)
}

/// Unresolved gaps for `source`, oldest first.
pub fn open_gaps(conn: &Connection, source: &SourceName) -> MetaResult<Vec<Gap>> {
    let sql = format!(
        "SELECT {GAP_COLUMNS} FROM lk_meta.gaps
         WHERE source = ? AND gap_end IS NULL
         ORDER BY gap_start, gap_id"
    );
    query_gaps(conn, &sql, &[&source.as_str()])
}

/// List gaps, newest first. Resolved gaps are included when `include_resolved`.
pub fn list_gaps(
    conn: &Connection,
    source: Option<&SourceName>,
    include_resolved: bool,
) -> MetaResult<Vec<Gap>> {
    let mut sql = format!("SELECT {GAP_COLUMNS} FROM lk_meta.gaps WHERE 1 = 1");
    if !include_resolved {
        sql.push_str(" AND gap_end IS NULL");
    }
    match source {
        Some(source) => {
            sql.push_str(" AND source = ? ORDER BY gap_start DESC, gap_id DESC");
            query_gaps(conn, &sql, &[&source.as_str()])
        }
        None => {
            sql.push_str(" ORDER BY gap_start DESC, gap_id DESC");
            query_gaps(conn, &sql, &[])
        }
    }
}

/// Close the source's open gaps that started no later than `at`. Returns how
/// many gaps were closed.
pub fn resolve_open_gaps(conn: &Connection, source: &SourceName, at: DateTime<Utc>) -> MetaResult<usize> {
    let at = ts(&at);
    conn.execute(
        "UPDATE lk_meta.gaps SET
             gap_end = CAST(? AS TIMESTAMP),
             updated_at = CAST(? AS TIMESTAMP),
             gap_hours = GREATEST(epoch_us(CAST(? AS TIMESTAMP)) - epoch_us(gap_start), 0) / 3600000000.0
         WHERE source = ? AND gap_end IS NULL AND gap_start <= CAST(? AS TIMESTAMP)",
        duckdb::params![at, at, at, source.as_str(), at],
    )
    .query_context("resolve open gaps")
}

/// Close open gaps that a later successful run has already ended.
fn resolve_recovered_gaps(
    conn: &Connection,
    source: &SourceName,
    last_success: DateTime<Utc>,
) -> MetaResult<usize> {
    let at = ts(&last_success);
    conn.execute(
        "UPDATE lk_meta.gaps SET
             gap_end = CAST(? AS TIMESTAMP),
             updated_at = CAST(? AS TIMESTAMP),
             gap_hours = GREATEST(epoch_us(CAST(? AS TIMESTAMP)) - epoch_us(gap_start), 0) / 3600000000.0
         WHERE source = ? AND gap_end IS NULL AND gap_start < CAST(? AS TIMESTAMP)",
        duckdb::params![at, at, at, source.as_str(), at],
    )
    .query_context("resolve recovered gaps")
}

/// What one detection pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapDetection {
    pub opened: usize,
    pub extended: usize,
    pub resolved: usize,
    pub alerts_raised: usize,
    /// Sources without any run
    pub skipped: usize,
}

impl GapDetection {
    pub fn records_affected(&self) -> usize {
        self.opened + self.extended + self.resolved
    }
}

fn detect_source(
    conn: &Connection,
    source: &SourceName,
    cfg: &GapConfig,
    alerts: &AlertConfig,
    now: DateTime<Utc>,
    report: &mut GapDetection,
) -> MetaResult<()> {
    let last_success = last_success_at(conn, source)?;
    let first_started = first_started_at(conn, source)?;
    let Some(since) = last_success.or(first_started) else {
        report.skipped += 1;
        return Ok(());
    };

    if let Some(success) = last_success {
        report.resolved += resolve_recovered_gaps(conn, source, success)?;
    }

    // A source younger than the history window is averaged over its lifetime
    let history_start = now - Duration::days(cfg.history_days);
    let window_start = first_started.map_or(history_start, |first| first.max(history_start));
    let window_hours = hours_between(window_start, now);
    let valid = valid_records_between(conn, source, window_start, now)?;
    let avg_per_hour = if window_hours > 0.0 {
        valid as f64 / window_hours
    } else {
        0.0
    };

    let open = open_gaps(conn, source)?;
    match evaluate_gap(since, now, &open, avg_per_hour, cfg) {
        GapDecision::WithinThreshold => {}
        GapDecision::Open(measure) => {
            let gap_id: i64 = conn
                .query_row(
                    "INSERT INTO lk_meta.gaps (source, gap_start, gap_hours,
                         estimated_missing_records, business_impact, detected_at, updated_at)
                     VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
                     RETURNING gap_id",
                    duckdb::params![
                        source.as_str(),
                        ts(&measure.gap_start),
                        measure.gap_hours,
                        count_param(measure.estimated_missing_records),
                        measure.business_impact.as_str(),
                        ts(&now),
                        ts(&now),
                    ],
                    |row| row.get(0),
                )
                .query_context("insert gap")?;
            report.opened += 1;
            log::info!(
                "Opened gap #{gap_id} for {source}: {:.1}h, ~{} records missing, {} impact",
                measure.gap_hours,
                measure.estimated_missing_records,
                measure.business_impact
            );

            let alert = NewAlert::new(
                source.as_str(),
                AlertKind::Gap,
                gap_alert_severity(measure.gap_hours, cfg),
                format!(
                    "No successful collection from {source} for {:.1} hours (~{} records missing)",
                    measure.gap_hours, measure.estimated_missing_records
                ),
            );
            if raise_alert(conn, &alert, alerts.cooldown(AlertKind::Gap), now)?.is_some() {
                report.alerts_raised += 1;
            }
        }
        GapDecision::Extend { gap_id, measure } => {
            conn.execute(
                "UPDATE lk_meta.gaps SET gap_hours = ?, estimated_missing_records = ?,
                     business_impact = ?, updated_at = CAST(? AS TIMESTAMP)
                 WHERE gap_id = ?",
                duckdb::params![
                    measure.gap_hours,
                    count_param(measure.estimated_missing_records),
                    measure.business_impact.as_str(),
                    ts(&now),
                    gap_id,
                ],
            )
            .query_context("extend gap")?;
            report.extended += 1;
            log::debug!("Extended gap #{gap_id} for {source} to {:.1}h", measure.gap_hours);
        }
    }
    Ok(())
}

/// Run gap detection for every source.
///
/// All sources are evaluated in one transaction; when any source fails, or
/// the deadline passes, nothing from the pass is committed.
pub fn detect_gaps(
    db: &MonitorDb,
    sources: &[SourceName],
    cfg: &GapConfig,
    alerts: &AlertConfig,
    now: DateTime<Utc>,
) -> MetaResult<GapDetection> {
    db.transaction(|conn| {
        let mut report = GapDetection::default();
        for source in sources {
            detect_source(conn, source, cfg, alerts, now, &mut report).map_err(|e| {
                log::warn!("Gap detection failed for {source}: {e}");
                e
            })?;
        }
        Ok(report)
    })
}

#[cfg(test)]
#[path = "gaps_test.rs"]
mod tests;
