//! The scheduled monitoring jobs.
//!
//! Each run receives its own database handle carrying the run deadline. The
//! blocking database work runs on tokio's blocking pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lk_core::Config;
use lk_meta::collection::known_sources;
use lk_meta::dead_tuples::record_samples;
use lk_meta::gaps::detect_gaps;
use lk_meta::health::{refresh_health, HealthPolicy};
use lk_meta::MonitorDb;
use std::sync::Arc;
use std::time::Duration;

use crate::stats_feed::TableStatsSource;

/// A periodic job run by the scheduler.
#[async_trait]
pub(crate) trait Job: Send + Sync {
    /// Name recorded in the job run log
    fn name(&self) -> &'static str;

    /// Time between the starts of two runs
    fn interval(&self) -> Duration;

    /// Run once against `db`. Returns the number of records affected.
    async fn run(&self, db: MonitorDb, now: DateTime<Utc>) -> Result<u64>;
}

/// Recomputes health snapshots for every known source.
pub(crate) struct HealthRefreshJob {
    config: Arc<Config>,
}

impl HealthRefreshJob {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Job for HealthRefreshJob {
    fn name(&self) -> &'static str {
        "health_refresh"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.scheduler.health_interval_secs)
    }

    async fn run(&self, db: MonitorDb, now: DateTime<Utc>) -> Result<u64> {
        let config = Arc::clone(&self.config);
        let refresh = tokio::task::spawn_blocking(move || {
            let policy = HealthPolicy {
                health: &config.health,
                levels: &config.alert_levels,
                alerts: &config.alerts,
            };
            refresh_health(&db, &config.sources, policy, now)
        })
        .await
        .context("health refresh task failed")??;
        Ok(refresh.snapshots.len() as u64)
    }
}

/// Opens, extends, and resolves collection gaps.
pub(crate) struct GapDetectionJob {
    config: Arc<Config>,
}

impl GapDetectionJob {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Job for GapDetectionJob {
    fn name(&self) -> &'static str {
        "gap_detection"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.scheduler.gap_interval_secs)
    }

    async fn run(&self, db: MonitorDb, now: DateTime<Utc>) -> Result<u64> {
        let config = Arc::clone(&self.config);
        let report = tokio::task::spawn_blocking(move || {
            let sources = known_sources(db.conn(), &config.sources)?;
            detect_gaps(&db, &sources, &config.gaps, &config.alerts, now)
        })
        .await
        .context("gap detection task failed")??;
        Ok(report.records_affected() as u64)
    }
}

/// Samples table bloat from a statistics feed.
pub(crate) struct DeadTupleSweepJob {
    config: Arc<Config>,
    feed: Arc<dyn TableStatsSource>,
}

impl DeadTupleSweepJob {
    pub(crate) fn new(config: Arc<Config>, feed: Arc<dyn TableStatsSource>) -> Self {
        Self { config, feed }
    }
}

#[async_trait]
impl Job for DeadTupleSweepJob {
    fn name(&self) -> &'static str {
        "dead_tuple_sweep"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.scheduler.dead_tuple_interval_secs)
    }

    async fn run(&self, db: MonitorDb, now: DateTime<Utc>) -> Result<u64> {
        let stats = self.feed.fetch().await?;
        let config = Arc::clone(&self.config);
        let report = tokio::task::spawn_blocking(move || {
            record_samples(&db, &stats, &config.dead_tuples, &config.alerts, now)
        })
        .await
        .context("dead tuple sweep task failed")??;
        Ok(report.records_affected() as u64)
    }
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
