//! Alerts command - list, acknowledge, and resolve alerts

use anyhow::{Context, Result};
use chrono::Utc;
use lk_core::Alert;
use lk_meta::alerts::{acknowledge, list_alerts, resolve, AlertFilter};

use crate::cli::{AlertsAckArgs, AlertsArgs, AlertsCommands, AlertsListArgs, AlertsResolveArgs, GlobalArgs};
use crate::commands::common::{format_opt_ts, format_ts, print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the alerts command
pub(crate) async fn execute(args: &AlertsArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        AlertsCommands::List(list) => execute_list(list, global),
        AlertsCommands::Ack(ack) => execute_ack(ack, global),
        AlertsCommands::Resolve(res) => execute_resolve(res, global),
    }
}

fn execute_list(args: &AlertsListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let filter = AlertFilter {
        source: args.source.clone(),
        kind: args.kind,
        include_resolved: args.all,
    };
    let alerts = list_alerts(ctx.db.conn(), &filter).context("Failed to list alerts")?;
    if args.json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No {}alerts.", if args.all { "" } else { "active " });
        return Ok(());
    }

    let rows: Vec<Vec<String>> = alerts
        .iter()
        .map(|a| {
            vec![
                a.alert_id.to_string(),
                a.source.clone(),
                a.kind.to_string(),
                a.severity.to_string(),
                format_ts(&a.created_at),
                a.acknowledged_by.clone().unwrap_or_else(|| "-".to_string()),
                format_opt_ts(a.resolved_at.as_ref()),
                a.message.clone(),
            ]
        })
        .collect();
    print_table(
        &["ID", "SOURCE", "KIND", "SEVERITY", "CREATED", "ACKED_BY", "RESOLVED", "MESSAGE"],
        &rows,
    );
    Ok(())
}

fn execute_ack(args: &AlertsAckArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let alert = acknowledge(&ctx.db, args.id, &args.by, Utc::now())
        .with_context(|| format!("Failed to acknowledge alert {}", args.id))?;
    print_alert_state(&alert);
    Ok(())
}

fn execute_resolve(args: &AlertsResolveArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let alert = resolve(&ctx.db, args.id, Utc::now())
        .with_context(|| format!("Failed to resolve alert {}", args.id))?;
    print_alert_state(&alert);
    Ok(())
}

fn print_alert_state(alert: &Alert) {
    let state = if alert.is_active() {
        "active"
    } else {
        "resolved"
    };
    match &alert.acknowledged_by {
        Some(by) => println!(
            "Alert {} ({} {} for {}) is {state}, acknowledged by {by}",
            alert.alert_id, alert.severity, alert.kind, alert.source
        ),
        None => println!(
            "Alert {} ({} {} for {}) is {state}",
            alert.alert_id, alert.severity, alert.kind, alert.source
        ),
    }
}
