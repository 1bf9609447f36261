//! Gaps command - detect and list collection gaps

use anyhow::{Context, Result};
use chrono::Utc;
use lk_meta::gaps::{detect_gaps, list_gaps};

use crate::cli::{GapsArgs, GapsCommands, GapsListArgs, GlobalArgs};
use crate::commands::common::{format_opt_ts, format_ts, print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the gaps command
pub(crate) async fn execute(args: &GapsArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        GapsCommands::Detect => execute_detect(global),
        GapsCommands::List(list) => execute_list(list, global),
    }
}

fn execute_detect(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let sources = lk_meta::collection::known_sources(ctx.db.conn(), &ctx.config.sources)
        .context("Failed to list sources")?;
    let report = detect_gaps(
        &ctx.db,
        &sources,
        &ctx.config.gaps,
        &ctx.config.alerts,
        Utc::now(),
    )
    .context("Gap detection failed")?;
    println!(
        "Gap detection: {} opened, {} extended, {} resolved, {} alerts raised ({} sources without runs)",
        report.opened, report.extended, report.resolved, report.alerts_raised, report.skipped
    );
    Ok(())
}

fn execute_list(args: &GapsListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let gaps = list_gaps(ctx.db.conn(), args.source.as_ref(), args.all)
        .context("Failed to list gaps")?;
    if args.json {
        return print_json(&gaps);
    }
    if gaps.is_empty() {
        println!("No {}gaps.", if args.all { "" } else { "open " });
        return Ok(());
    }

    let rows: Vec<Vec<String>> = gaps
        .iter()
        .map(|g| {
            vec![
                g.gap_id.to_string(),
                g.source.to_string(),
                format_ts(&g.gap_start),
                format_opt_ts(g.gap_end.as_ref()),
                format!("{:.1}", g.gap_hours),
                g.estimated_missing_records.to_string(),
                g.business_impact.to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "SOURCE", "START", "END", "HOURS", "MISSING", "IMPACT"],
        &rows,
    );
    Ok(())
}
