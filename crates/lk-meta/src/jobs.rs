//! Operational log of scheduled job runs.

use crate::error::{MetaResult, MetaResultExt};
use crate::row_helpers::{count_param, get_count, get_parsed, get_ts, ts};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lk_core::CoreError;
use serde::Serialize;

/// How a job run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "timed_out" => Ok(JobStatus::TimedOut),
            other => Err(CoreError::UnknownLabel {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished job run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRun {
    pub job_name: String,
    pub invocation_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
    pub records_affected: u64,
    pub error_message: Option<String>,
}

/// Append a job run to the log.
pub fn record_job_run(conn: &Connection, run: &JobRun) -> MetaResult<()> {
    conn.execute(
        "INSERT INTO lk_meta.job_runs (job_name, invocation_id, started_at, finished_at,
             status, records_affected, error_message)
         VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?)",
        duckdb::params![
            run.job_name,
            run.invocation_id,
            ts(&run.started_at),
            ts(&run.finished_at),
            run.status.as_str(),
            count_param(run.records_affected),
            run.error_message,
        ],
    )
    .query_context("insert job run")?;
    Ok(())
}

/// Most recent job runs, newest first, optionally for one job.
pub fn list_job_runs(conn: &Connection, job_name: Option<&str>, limit: usize) -> MetaResult<Vec<JobRun>> {
    let mut sql = String::from(
        "SELECT job_name, invocation_id, epoch_us(started_at), epoch_us(finished_at), status,
             records_affected, error_message
         FROM lk_meta.job_runs",
    );
    let params: Vec<&str> = match job_name {
        Some(name) => {
            sql.push_str(" WHERE job_name = ?");
            vec![name]
        }
        None => Vec::new(),
    };
    sql.push_str(&format!(" ORDER BY started_at DESC, job_run_id DESC LIMIT {limit}"));

    let mut stmt = conn.prepare(&sql).query_context("prepare job runs")?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), |row| {
            Ok(JobRun {
                job_name: row.get(0)?,
                invocation_id: row.get(1)?,
                started_at: get_ts(row, 2)?,
                finished_at: get_ts(row, 3)?,
                status: get_parsed(row, 4, JobStatus::parse)?,
                records_affected: get_count(row, 5)?,
                error_message: row.get(6)?,
            })
        })
        .query_context("query job runs")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect job runs")?;
    Ok(rows)
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
