//! Daily dead-tuple samples and vacuum alerts.

use crate::alerts::raise_alert;
use crate::connection::MonitorDb;
use crate::error::{MetaResult, MetaResultExt};
use crate::row_helpers::{count_param, day, get_count, get_date, get_ts, ts};
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::Connection;
use lk_core::alert::{AlertConfig, AlertKind, NewAlert};
use lk_core::dead_tuple::{DeadTupleConfig, DeadTupleSample, TableStats};
use serde::Serialize;

/// A persisted sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSample {
    pub sample_date: NaiveDate,
    pub sampled_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sample: DeadTupleSample,
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub inserted: usize,
    pub updated: usize,
    pub vacuum_recommended: usize,
    pub alerts_raised: usize,
}

impl SweepReport {
    pub fn records_affected(&self) -> usize {
        self.inserted + self.updated
    }
}

fn map_sample(row: &duckdb::Row<'_>) -> duckdb::Result<StoredSample> {
    Ok(StoredSample {
        sample: DeadTupleSample {
            schema_name: row.get(0)?,
            table_name: row.get(1)?,
            live_tuples: get_count(row, 3)?,
            dead_tuples: get_count(row, 4)?,
            dead_ratio: row.get(5)?,
            vacuum_recommended: row.get(6)?,
        },
        sample_date: get_date(row, 2)?,
        sampled_at: get_ts(row, 7)?,
    })
}

fn write_sample(conn: &Connection, sample: &DeadTupleSample, now: DateTime<Utc>) -> MetaResult<bool> {
    let updated = conn
        .execute(
            "UPDATE lk_meta.dead_tuple_samples SET live_tuples = ?, dead_tuples = ?,
                 dead_ratio = ?, vacuum_recommended = ?, sampled_at = CAST(? AS TIMESTAMP)
             WHERE schema_name = ? AND table_name = ? AND sample_date = CAST(? AS DATE)",
            duckdb::params![
                count_param(sample.live_tuples),
                count_param(sample.dead_tuples),
                sample.dead_ratio,
                sample.vacuum_recommended,
                ts(&now),
                sample.schema_name,
                sample.table_name,
                day(&now),
            ],
        )
        .query_context("update dead tuple sample")?;
    if updated > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO lk_meta.dead_tuple_samples (schema_name, table_name, sample_date,
             live_tuples, dead_tuples, dead_ratio, vacuum_recommended, sampled_at)
         VALUES (?, ?, CAST(? AS DATE), ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
        duckdb::params![
            sample.schema_name,
            sample.table_name,
            day(&now),
            count_param(sample.live_tuples),
            count_param(sample.dead_tuples),
            sample.dead_ratio,
            sample.vacuum_recommended,
            ts(&now),
        ],
    )
    .query_context("insert dead tuple sample")?;
    Ok(true)
}

/// Record one sample per table for the UTC day of `now`, raising a
/// `dead_tuple` alert for each table that needs a vacuum.
///
/// Every statistic is validated before anything is written; the whole sweep
/// commits in one transaction.
pub fn record_samples(
    db: &MonitorDb,
    stats: &[TableStats],
    cfg: &DeadTupleConfig,
    alerts: &AlertConfig,
    now: DateTime<Utc>,
) -> MetaResult<SweepReport> {
    let samples = stats
        .iter()
        .map(|s| DeadTupleSample::compute(s, cfg))
        .collect::<Result<Vec<_>, _>>()?;

    let report = db.transaction(|conn| {
        let mut report = SweepReport::default();
        for sample in &samples {
            if write_sample(conn, sample, now)? {
                report.inserted += 1;
            } else {
                report.updated += 1;
            }

            let Some(severity) = sample.alert_severity(cfg) else {
                continue;
            };
            report.vacuum_recommended += 1;
            let alert = NewAlert::new(
                sample.qualified_name(),
                AlertKind::DeadTuple,
                severity,
                format!(
                    "{} has {} dead tuples for {} live (ratio {:.4}); vacuum recommended",
                    sample.qualified_name(),
                    sample.dead_tuples,
                    sample.live_tuples,
                    sample.dead_ratio
                ),
            );
            if raise_alert(conn, &alert, alerts.cooldown(AlertKind::DeadTuple), now)?.is_some() {
                report.alerts_raised += 1;
            }
        }
        Ok(report)
    })?;

    log::info!(
        "Dead tuple sweep: {} tables sampled, {} need vacuum",
        samples.len(),
        report.vacuum_recommended
    );
    Ok(report)
}

/// Samples newest first. `only_recommended` keeps tables that need a vacuum.
pub fn list_samples(
    conn: &Connection,
    since: Option<NaiveDate>,
    only_recommended: bool,
) -> MetaResult<Vec<StoredSample>> {
    let mut sql = String::from(
        "SELECT schema_name, table_name, CAST(sample_date AS VARCHAR), live_tuples,
             dead_tuples, dead_ratio, vacuum_recommended, epoch_us(sampled_at)
         FROM lk_meta.dead_tuple_samples WHERE 1 = 1",
    );
    let mut params: Vec<String> = Vec::new();
    if let Some(since) = since {
        sql.push_str(" AND sample_date >= CAST(? AS DATE)");
        params.push(since.format("%Y-%m-%d").to_string());
    }
    if only_recommended {
        sql.push_str(" AND vacuum_recommended");
    }
    sql.push_str(" ORDER BY sample_date DESC, dead_ratio DESC, schema_name, table_name");

    let mut stmt = conn.prepare(&sql).query_context("prepare dead tuple samples")?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), map_sample)
        .query_context("query dead tuple samples")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect dead tuple samples")?;
    Ok(rows)
}

#[cfg(test)]
#[path = "dead_tuples_test.rs"]
mod tests;
