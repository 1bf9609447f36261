//! Tick loop that fires due jobs and records every run.

use anyhow::{Context, Result};
use chrono::Utc;
use lk_meta::jobs::{record_job_run, JobRun, JobStatus};
use lk_meta::{MetaError, MonitorDb};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use uuid::Uuid;

use super::jobs::Job;

/// A registered job and its run state.
struct JobEntry {
    job: Arc<dyn Job>,
    last_run: Option<Instant>,
    /// Guards against overlapping invocations of the same job.
    is_running: Arc<AtomicBool>,
}

/// Clears the running flag when a run finishes, even if it panicked.
pub(crate) struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs registered jobs on their intervals.
///
/// Different jobs may run concurrently; a job never overlaps itself. Every
/// run works on its own connection to the shared database.
pub(crate) struct Scheduler {
    db: MonitorDb,
    jobs: Vec<JobEntry>,
    job_timeout: Duration,
    tick_interval: Duration,
}

impl Scheduler {
    pub(crate) fn new(db: MonitorDb, job_timeout: Duration) -> Self {
        Self {
            db,
            jobs: Vec::new(),
            job_timeout,
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Register a periodic job.
    pub(crate) fn register(&mut self, job: Arc<dyn Job>) {
        log::info!(
            "Registered job {} every {}s",
            job.name(),
            job.interval().as_secs()
        );
        self.jobs.push(JobEntry {
            job,
            last_run: None,
            is_running: Arc::new(AtomicBool::new(false)),
        });
    }

    pub(crate) fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|e| e.job.name()).collect()
    }

    /// Run every job once, one after another.
    pub(crate) async fn run_once(&self) -> Result<Vec<JobRun>> {
        let mut runs = Vec::with_capacity(self.jobs.len());
        for entry in &self.jobs {
            let db = self.db.try_clone()?;
            runs.push(execute_job(Arc::clone(&entry.job), db, self.job_timeout, None).await?);
        }
        Ok(runs)
    }

    /// Fire due jobs until `shutdown` completes, then wait for in-flight
    /// runs to finish.
    pub(crate) async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut in_flight = JoinSet::new();

        loop {
            self.tick(&mut in_flight);
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
            while let Some(done) = in_flight.try_join_next() {
                log_join_failure(done);
            }
        }

        if !in_flight.is_empty() {
            log::info!("Waiting for {} running jobs to finish", in_flight.len());
        }
        while let Some(done) = in_flight.join_next().await {
            log_join_failure(done);
        }
        log::info!("Scheduler stopped");
        Ok(())
    }

    /// Spawn every job whose interval has elapsed and that is not running.
    fn tick(&mut self, in_flight: &mut JoinSet<()>) {
        let now = Instant::now();
        for entry in &mut self.jobs {
            let due = entry
                .last_run
                .map_or(true, |last| now.duration_since(last) >= entry.job.interval());
            if !due {
                continue;
            }
            if entry.is_running.load(Ordering::Acquire) {
                log::debug!(
                    "Skipping {}: previous invocation still running",
                    entry.job.name()
                );
                continue;
            }

            let db = match self.db.try_clone() {
                Ok(db) => db,
                Err(e) => {
                    log::error!("Cannot start {}: {e}", entry.job.name());
                    continue;
                }
            };
            entry.last_run = Some(now);
            entry.is_running.store(true, Ordering::Release);
            let guard = RunningGuard(Arc::clone(&entry.is_running));
            let job = Arc::clone(&entry.job);
            let timeout = self.job_timeout;
            in_flight.spawn(async move {
                if let Err(e) = execute_job(job, db, timeout, Some(guard)).await {
                    log::error!("Job run could not be recorded: {e:#}");
                }
            });
        }
    }
}

fn log_join_failure(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        log::error!("Job task failed: {e}");
    }
}

/// Whether a failed run hit its deadline.
fn is_timeout(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<MetaError>(), Some(MetaError::Timeout(_)))
}

/// Run `job` once under `timeout` and append the result to the job run log.
///
/// The run gets a fresh connection whose transactions roll back once the
/// deadline has passed; the awaiting side stops waiting at the same moment.
/// The job itself runs on its own task and keeps `guard` until that task
/// ends, so a run abandoned at the timeout still counts as running.
pub(crate) async fn execute_job(
    job: Arc<dyn Job>,
    db: MonitorDb,
    timeout: Duration,
    guard: Option<RunningGuard>,
) -> Result<JobRun> {
    let invocation_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let run_db = db
        .try_clone()
        .context("Failed to open a connection for the job")?
        .with_deadline(Instant::now() + timeout);

    log::debug!("Job {} starting ({invocation_id})", job.name());
    let task_job = Arc::clone(&job);
    let mut task = tokio::spawn(async move {
        let _guard = guard;
        task_job.run(run_db, started_at).await
    });
    let outcome = tokio::time::timeout(timeout, &mut task).await;
    let finished_at = Utc::now();

    let (status, records_affected, error_message) = match outcome {
        Ok(Ok(Ok(records))) => (JobStatus::Success, records, None),
        Ok(Ok(Err(e))) if is_timeout(&e) => (JobStatus::TimedOut, 0, Some(format!("{e:#}"))),
        Ok(Ok(Err(e))) => (JobStatus::Failed, 0, Some(format!("{e:#}"))),
        Ok(Err(join_err)) => (JobStatus::Failed, 0, Some(format!("job task failed: {join_err}"))),
        Err(_) => {
            log::warn!(
                "Job {} still running after its timeout; it stays marked running until it ends",
                job.name()
            );
            (
                JobStatus::TimedOut,
                0,
                Some(format!("exceeded {}s timeout", timeout.as_secs_f64())),
            )
        }
    };
    match &error_message {
        None => log::info!(
            "Job {} finished: {records_affected} records in {}ms",
            job.name(),
            (finished_at - started_at).num_milliseconds()
        ),
        Some(message) => log::warn!("Job {} {status}: {message}", job.name()),
    }

    let run = JobRun {
        job_name: job.name().to_string(),
        invocation_id,
        started_at,
        finished_at,
        status,
        records_affected,
        error_message,
    };
    let record = run.clone();
    tokio::task::spawn_blocking(move || record_job_run(db.conn(), &record))
        .await
        .context("job log task failed")?
        .context("Failed to record job run")?;
    Ok(run)
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
