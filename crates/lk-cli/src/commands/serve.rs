//! Serve command - run the monitoring jobs on their schedules

use anyhow::Result;
use lk_meta::jobs::JobStatus;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{GlobalArgs, ServeArgs};
use crate::commands::common::{print_table, ExitCode};
use crate::context::RuntimeContext;
use crate::scheduler::{DeadTupleSweepJob, GapDetectionJob, HealthRefreshJob, Scheduler};
use crate::stats_feed::{JsonStatsFeed, TableStatsSource};

/// Execute the serve command
pub(crate) async fn execute(args: &ServeArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let feed_path = ctx
        .config
        .dead_tuples
        .stats_feed
        .as_deref()
        .map(|p| ctx.resolve_path(p));
    let RuntimeContext { config, db, .. } = ctx;

    let config = Arc::new(config);
    let mut scheduler = Scheduler::new(db, Duration::from_secs(config.scheduler.job_timeout_secs));
    scheduler.register(Arc::new(HealthRefreshJob::new(Arc::clone(&config))));
    scheduler.register(Arc::new(GapDetectionJob::new(Arc::clone(&config))));
    match feed_path {
        Some(path) => {
            let feed: Arc<dyn TableStatsSource> = Arc::new(JsonStatsFeed::new(path));
            log::info!("Dead tuple sweep reads {}", feed.describe());
            scheduler.register(Arc::new(DeadTupleSweepJob::new(Arc::clone(&config), feed)));
        }
        None => log::info!("Dead tuple sweep disabled: dead_tuples.stats_feed is not set"),
    }

    if args.once {
        let runs = scheduler.run_once().await?;
        let rows: Vec<Vec<String>> = runs
            .iter()
            .map(|r| {
                vec![
                    r.job_name.clone(),
                    r.status.to_string(),
                    r.records_affected.to_string(),
                    r.error_message.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["JOB", "STATUS", "RECORDS", "ERROR"], &rows);
        if runs.iter().any(|r| r.status != JobStatus::Success) {
            return Err(ExitCode(1).into());
        }
        return Ok(());
    }

    log::info!(
        "Scheduler started with jobs: {}",
        scheduler.job_names().join(", ")
    );
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
}
