//! Deadtuples command - sample table bloat and list samples

use anyhow::{Context, Result};
use chrono::Utc;
use lk_meta::dead_tuples::{list_samples, record_samples};
use std::path::PathBuf;

use crate::cli::{DeadTuplesArgs, DeadTuplesCommands, DeadTuplesListArgs, DeadTuplesSweepArgs, GlobalArgs};
use crate::commands::common::{print_json, print_table};
use crate::context::RuntimeContext;
use crate::stats_feed::{JsonStatsFeed, TableStatsSource};

/// Execute the deadtuples command
pub(crate) async fn execute(args: &DeadTuplesArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        DeadTuplesCommands::Sweep(sweep) => execute_sweep(sweep, global).await,
        DeadTuplesCommands::List(list) => execute_list(list, global),
    }
}

async fn execute_sweep(args: &DeadTuplesSweepArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let feed_path = match (&args.feed, &ctx.config.dead_tuples.stats_feed) {
        (Some(flag), _) => PathBuf::from(flag),
        (None, Some(configured)) => ctx.resolve_path(configured),
        (None, None) => anyhow::bail!(
            "No stats feed given. Pass --feed or set dead_tuples.stats_feed in the configuration."
        ),
    };

    let feed = JsonStatsFeed::new(feed_path);
    ctx.verbose(&format!("Reading table statistics from {}", feed.describe()));
    let stats = feed.fetch().await?;
    let report = record_samples(
        &ctx.db,
        &stats,
        &ctx.config.dead_tuples,
        &ctx.config.alerts,
        Utc::now(),
    )
    .context("Dead tuple sweep failed")?;
    println!(
        "Sampled {} tables ({} new, {} updated): {} need vacuum, {} alerts raised",
        stats.len(),
        report.inserted,
        report.updated,
        report.vacuum_recommended,
        report.alerts_raised
    );
    Ok(())
}

fn execute_list(args: &DeadTuplesListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let samples = list_samples(ctx.db.conn(), args.since, args.recommended)
        .context("Failed to list dead tuple samples")?;
    if args.json {
        return print_json(&samples);
    }
    if samples.is_empty() {
        println!("No samples recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = samples
        .iter()
        .map(|s| {
            vec![
                s.sample_date.to_string(),
                s.sample.qualified_name(),
                s.sample.live_tuples.to_string(),
                s.sample.dead_tuples.to_string(),
                format!("{:.4}", s.sample.dead_ratio),
                if s.sample.vacuum_recommended { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(
        &["DATE", "TABLE", "LIVE", "DEAD", "RATIO", "VACUUM"],
        &rows,
    );
    Ok(())
}
