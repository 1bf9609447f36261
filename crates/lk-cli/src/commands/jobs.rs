//! Jobs command - history of scheduled job runs

use anyhow::{Context, Result};
use lk_meta::jobs::list_job_runs;

use crate::cli::{GlobalArgs, JobsArgs};
use crate::commands::common::{format_ts, print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the jobs command
pub(crate) async fn execute(args: &JobsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let runs = list_job_runs(ctx.db.conn(), args.job.as_deref(), args.limit)
        .context("Failed to list job runs")?;
    if args.json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("No job runs recorded. Start the scheduler with `lk serve`.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = runs
        .iter()
        .map(|r| {
            let millis = (r.finished_at - r.started_at).num_milliseconds();
            vec![
                r.job_name.clone(),
                format_ts(&r.started_at),
                format!("{millis}ms"),
                r.status.to_string(),
                r.records_affected.to_string(),
                r.error_message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["JOB", "STARTED", "DURATION", "STATUS", "RECORDS", "ERROR"],
        &rows,
    );
    Ok(())
}
