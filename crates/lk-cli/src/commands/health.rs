//! Health command - show and refresh per-source collection health

use anyhow::{Context, Result};
use chrono::Utc;
use lk_core::HealthSnapshot;
use lk_meta::health::{current_health, health_history, refresh_health, HealthPolicy};

use crate::cli::{GlobalArgs, HealthArgs, HealthCommands, HealthHistoryArgs, HealthShowArgs};
use crate::commands::common::{format_opt_f64, format_ts, print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the health command
pub(crate) async fn execute(args: &HealthArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        HealthCommands::Show(show) => execute_show(show, global),
        HealthCommands::Refresh => execute_refresh(global),
        HealthCommands::History(history) => execute_history(history, global),
    }
}

fn execute_show(args: &HealthShowArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let snapshots =
        current_health(ctx.db.conn(), args.source.as_ref()).context("Failed to read health")?;
    if args.json {
        return print_json(&snapshots);
    }
    if snapshots.is_empty() {
        println!("No health snapshots yet. Run `lk health refresh` first.");
        return Ok(());
    }
    print_snapshots(&snapshots);
    Ok(())
}

fn execute_refresh(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let config = &ctx.config;
    let policy = HealthPolicy {
        health: &config.health,
        levels: &config.alert_levels,
        alerts: &config.alerts,
    };
    let refresh = refresh_health(&ctx.db, &config.sources, policy, Utc::now())
        .context("Health refresh failed")?;

    for transition in &refresh.transitions {
        println!(
            "{}: {} -> {}",
            transition.source, transition.from, transition.to
        );
    }
    print_snapshots(&refresh.snapshots);
    println!(
        "\n{} sources refreshed, {} alerts raised, {} resolved",
        refresh.snapshots.len(),
        refresh.alerts_raised,
        refresh.alerts_resolved
    );
    Ok(())
}

fn execute_history(args: &HealthHistoryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let history = health_history(ctx.db.conn(), &args.source, args.limit)
        .with_context(|| format!("Failed to read health history for {}", args.source))?;
    if args.json {
        return print_json(&history);
    }
    print_snapshots(&history);
    Ok(())
}

fn print_snapshots(snapshots: &[HealthSnapshot]) {
    let rows: Vec<Vec<String>> = snapshots
        .iter()
        .map(|s| {
            let m = s.metrics.as_ref();
            vec![
                s.source.to_string(),
                s.status.to_string(),
                s.alert_level.to_string(),
                format_opt_f64(m.map(|m| m.success_rate), 2),
                format_opt_f64(m.map(|m| m.confidence), 2),
                format_opt_f64(m.map(|m| m.gap_hours), 1),
                m.map_or("-".to_string(), |m| m.consecutive_failures.to_string()),
                format_ts(&s.computed_at),
            ]
        })
        .collect();
    print_table(
        &[
            "SOURCE",
            "STATUS",
            "LEVEL",
            "SUCCESS",
            "CONFIDENCE",
            "GAP_H",
            "FAILURES",
            "COMPUTED",
        ],
        &rows,
    );
}
