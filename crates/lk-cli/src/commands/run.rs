//! Run command - record collection runs reported by collectors

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lk_core::RunOutcome;
use lk_meta::collection::record_run;

use crate::cli::{GlobalArgs, RunArgs, RunCommands, RunSubmitArgs};
use crate::context::RuntimeContext;

/// Execute the run command
pub(crate) async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        RunCommands::Submit(submit) => execute_submit(submit, global),
    }
}

fn execute_submit(args: &RunSubmitArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let now = Utc::now();
    let started_at = match &args.started_at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --started-at '{raw}': expected RFC 3339"))?
            .with_timezone(&Utc),
        None => now,
    };
    if started_at > now {
        anyhow::bail!("--started-at {raw} is in the future", raw = started_at.to_rfc3339());
    }

    let outcome = RunOutcome {
        status: args.status.into(),
        records_collected: args.records,
        records_valid: args.valid,
        records_invalid: args.invalid,
        confidence_score: args.confidence,
        avg_response_ms: args.avg_response_ms,
        max_response_ms: args.max_response_ms,
        error_message: args.error.clone(),
    };

    let run = record_run(&ctx.db, &args.source, started_at, &outcome, now)
        .context("Failed to record collection run")?;
    println!(
        "Recorded run {} for {}: {} ({} of {} records valid, success rate {:.2})",
        run.run_id,
        run.source,
        run.status,
        run.records_valid,
        run.records_collected,
        run.success_rate()
    );
    Ok(())
}
