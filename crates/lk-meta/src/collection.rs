//! Collection run lifecycle: begin, complete, and history queries.

use crate::alerts::resolve_active;
use crate::connection::MonitorDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::gaps::resolve_open_gaps;
use crate::row_helpers::{count_param, get_count, get_opt_ts, get_parsed, get_ts, ts};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lk_core::alert::AlertKind;
use lk_core::collection::{CollectionRun, RunOutcome, RunStatus};
use lk_core::{CoreError, SourceName};

const RUN_COLUMNS: &str = "run_id, source, epoch_us(started_at), epoch_us(completed_at), status, \
     records_collected, records_valid, records_invalid, confidence_score, \
     avg_response_ms, max_response_ms, error_message";

fn map_run(row: &duckdb::Row<'_>) -> duckdb::Result<CollectionRun> {
    Ok(CollectionRun {
        run_id: row.get(0)?,
        source: get_parsed(row, 1, SourceName::parse)?,
        started_at: get_ts(row, 2)?,
        completed_at: get_opt_ts(row, 3)?,
        status: get_parsed(row, 4, RunStatus::parse)?,
        records_collected: get_count(row, 5)?,
        records_valid: get_count(row, 6)?,
        records_invalid: get_count(row, 7)?,
        confidence_score: row.get(8)?,
        avg_response_ms: row.get(9)?,
        max_response_ms: row.get(10)?,
        error_message: row.get(11)?,
    })
}

fn insert_run(conn: &Connection, source: &SourceName, started_at: DateTime<Utc>) -> MetaResult<i64> {
    conn.query_row(
        "INSERT INTO lk_meta.collection_runs (source, started_at)
         VALUES (?, CAST(? AS TIMESTAMP))
         RETURNING run_id",
        duckdb::params![source.as_str(), ts(&started_at)],
        |row| row.get(0),
    )
    .query_context("insert collection_runs")
}

/// Open a run for `source`. Returns the new `run_id`.
pub fn begin_run(db: &MonitorDb, source: &SourceName, started_at: DateTime<Utc>) -> MetaResult<i64> {
    let run_id = db.transaction(|conn| insert_run(conn, source, started_at))?;
    log::debug!("Started collection run {run_id} for {source}");
    Ok(run_id)
}

/// Fetch one run.
pub fn get_run(conn: &Connection, run_id: i64) -> MetaResult<Option<CollectionRun>> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM lk_meta.collection_runs WHERE run_id = ?");
    match conn.query_row(&sql, duckdb::params![run_id], map_run) {
        Ok(run) => Ok(Some(run)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select collection run: {e}"))),
    }
}

fn close_run(
    conn: &Connection,
    run_id: i64,
    outcome: &RunOutcome,
    completed_at: DateTime<Utc>,
) -> MetaResult<CollectionRun> {
    let run = get_run(conn, run_id)?.ok_or_else(|| MetaError::NotFound {
        entity: "collection run",
        key: run_id.to_string(),
    })?;
    if run.status.is_closed() {
        return Err(MetaError::RunClosed {
            run_id,
            status: run.status.to_string(),
        });
    }
    if completed_at < run.started_at {
        return Err(CoreError::invalid(
            "completed_at",
            format!("{completed_at} is before the run started ({})", run.started_at),
        )
        .into());
    }

    conn.execute(
        "UPDATE lk_meta.collection_runs SET
             completed_at = CAST(? AS TIMESTAMP), status = ?, records_collected = ?,
             records_valid = ?, records_invalid = ?, confidence_score = ?,
             avg_response_ms = ?, max_response_ms = ?, error_message = ?
         WHERE run_id = ?",
        duckdb::params![
            ts(&completed_at),
            outcome.status.as_str(),
            count_param(outcome.records_collected),
            count_param(outcome.records_valid),
            count_param(outcome.records_invalid),
            outcome.confidence_score,
            outcome.avg_response_ms,
            outcome.max_response_ms,
            outcome.error_message,
            run_id,
        ],
    )
    .query_context("update collection_runs")?;

    if outcome.status.is_successful() {
        let closed = resolve_open_gaps(conn, &run.source, completed_at)?;
        if closed > 0 {
            resolve_active(conn, run.source.as_str(), AlertKind::Gap, completed_at)?;
            log::info!("{} recovered; closed {closed} open gap(s)", run.source);
        }
    }

    get_run(conn, run_id)?.ok_or_else(|| MetaError::NotFound {
        entity: "collection run",
        key: run_id.to_string(),
    })
}

/// Close a running run with its outcome.
///
/// Fails with `InvalidArgument` before touching the database when the outcome
/// is inconsistent, and with `RunClosed` when the run was already completed.
/// A successful or partial outcome closes the source's open gaps.
pub fn complete_run(
    db: &MonitorDb,
    run_id: i64,
    outcome: &RunOutcome,
    completed_at: DateTime<Utc>,
) -> MetaResult<CollectionRun> {
    outcome.validate()?;
    db.transaction(|conn| close_run(conn, run_id, outcome, completed_at))
}

/// Record a finished run in one step.
pub fn record_run(
    db: &MonitorDb,
    source: &SourceName,
    started_at: DateTime<Utc>,
    outcome: &RunOutcome,
    completed_at: DateTime<Utc>,
) -> MetaResult<CollectionRun> {
    outcome.validate()?;
    db.transaction(|conn| {
        let run_id = insert_run(conn, source, started_at)?;
        close_run(conn, run_id, outcome, completed_at)
    })
}

/// Closed runs for `source`, newest first.
pub fn recent_runs(conn: &Connection, source: &SourceName, limit: usize) -> MetaResult<Vec<CollectionRun>> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM lk_meta.collection_runs
         WHERE source = ? AND status <> 'running'
         ORDER BY started_at DESC, run_id DESC
         LIMIT {limit}"
    );
    let mut stmt = conn.prepare(&sql).query_context("prepare recent runs")?;
    let runs = stmt
        .query_map(duckdb::params![source.as_str()], map_run)
        .query_context("query recent runs")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect recent runs")?;
    Ok(runs)
}

fn select_ts(conn: &Connection, sql: &str, source: &SourceName) -> MetaResult<Option<DateTime<Utc>>> {
    let micros: Option<i64> = conn
        .query_row(sql, duckdb::params![source.as_str()], |row| row.get(0))
        .query_context("select run timestamp")?;
    Ok(micros.and_then(DateTime::from_timestamp_micros))
}

/// Completion time of the latest successful or partial run.
pub fn last_success_at(conn: &Connection, source: &SourceName) -> MetaResult<Option<DateTime<Utc>>> {
    select_ts(
        conn,
        "SELECT epoch_us(MAX(completed_at)) FROM lk_meta.collection_runs
         WHERE source = ? AND status IN ('success', 'partial')",
        source,
    )
}

/// Start time of the source's first run of any status.
pub fn first_started_at(conn: &Connection, source: &SourceName) -> MetaResult<Option<DateTime<Utc>>> {
    select_ts(
        conn,
        "SELECT epoch_us(MIN(started_at)) FROM lk_meta.collection_runs WHERE source = ?",
        source,
    )
}

/// Valid records collected by successful runs completed in `[since, until]`.
pub fn valid_records_between(
    conn: &Connection,
    source: &SourceName,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> MetaResult<u64> {
    let total: i64 = conn
        .query_row(
            "SELECT CAST(COALESCE(SUM(records_valid), 0) AS BIGINT)
             FROM lk_meta.collection_runs
             WHERE source = ? AND status IN ('success', 'partial')
               AND completed_at >= CAST(? AS TIMESTAMP)
               AND completed_at <= CAST(? AS TIMESTAMP)",
            duckdb::params![source.as_str(), ts(&since), ts(&until)],
            |row| row.get(0),
        )
        .query_context("sum valid records")?;
    Ok(total.max(0) as u64)
}

/// Every source that has reported at least one run.
pub fn sources_with_runs(conn: &Connection) -> MetaResult<Vec<SourceName>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT source FROM lk_meta.collection_runs ORDER BY source")
        .query_context("prepare run sources")?;
    let sources = stmt
        .query_map([], |row| get_parsed(row, 0, SourceName::parse))
        .query_context("query run sources")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect run sources")?;
    Ok(sources)
}

/// Configured sources followed by any other source with runs, deduplicated.
pub fn known_sources(conn: &Connection, configured: &[SourceName]) -> MetaResult<Vec<SourceName>> {
    let mut sources: Vec<SourceName> = configured.to_vec();
    for source in sources_with_runs(conn)? {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

#[cfg(test)]
#[path = "collection_test.rs"]
mod tests;
