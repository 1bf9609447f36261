//! Config command - versioned quality settings and their audit trail

use anyhow::{Context, Result};
use chrono::Utc;
use lk_meta::quality_config::{audit_log, config_version, get_setting, list_settings, set_setting};

use crate::cli::{ConfigArgs, ConfigAuditArgs, ConfigCommands, ConfigGetArgs, ConfigListArgs, ConfigSetArgs, GlobalArgs};
use crate::commands::common::{format_opt_ts, format_ts, print_json, print_table, ExitCode};
use crate::context::RuntimeContext;

/// Execute the config command
pub(crate) async fn execute(args: &ConfigArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        ConfigCommands::List(list) => execute_list(list, global),
        ConfigCommands::Get(get) => execute_get(get, global),
        ConfigCommands::Set(set) => execute_set(set, global),
        ConfigCommands::Audit(audit) => execute_audit(audit, global),
    }
}

fn execute_list(args: &ConfigListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.db.conn();
    let settings = list_settings(conn).context("Failed to list quality settings")?;
    if args.json {
        return print_json(&settings);
    }

    let version = config_version(conn).context("Failed to read configuration version")?;
    println!("Quality settings (version {version})\n");
    let rows: Vec<Vec<String>> = settings
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.value.to_string(),
                s.updated_by.clone(),
                format_opt_ts(s.updated_at.as_ref()),
            ]
        })
        .collect();
    print_table(&["SETTING", "VALUE", "UPDATED_BY", "UPDATED_AT"], &rows);
    Ok(())
}

fn execute_get(args: &ConfigGetArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match get_setting(ctx.db.conn(), &args.name).context("Failed to read quality setting")? {
        Some(setting) => {
            println!("{} = {}", setting.name, setting.value);
            if let Some(description) = &setting.description {
                println!("  {description}");
            }
            Ok(())
        }
        None => {
            eprintln!("Unknown setting '{}'", args.name);
            Err(ExitCode(1).into())
        }
    }
}

fn execute_set(args: &ConfigSetArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let change = set_setting(&ctx.db, &args.name, args.value, &args.by, Utc::now())
        .with_context(|| format!("Failed to set {}", args.name))?;
    println!(
        "{}: {} -> {} (version {})",
        change.setting_name,
        change.old_value.map_or("unset".to_string(), |v| v.to_string()),
        change.new_value,
        change.config_version
    );
    Ok(())
}

fn execute_audit(args: &ConfigAuditArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let changes =
        audit_log(ctx.db.conn(), args.name.as_deref()).context("Failed to read audit log")?;
    if args.json {
        return print_json(&changes);
    }
    if changes.is_empty() {
        println!("No configuration changes recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = changes
        .iter()
        .map(|c| {
            vec![
                c.config_version.to_string(),
                c.setting_name.clone(),
                c.old_value.map_or("-".to_string(), |v| v.to_string()),
                c.new_value.to_string(),
                c.changed_by.clone(),
                format_ts(&c.changed_at),
            ]
        })
        .collect();
    print_table(&["VERSION", "SETTING", "OLD", "NEW", "CHANGED_BY", "CHANGED_AT"], &rows);
    Ok(())
}
