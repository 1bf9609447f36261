//! Meta command - ad-hoc inspection of the monitoring database

use anyhow::{Context, Result};
use lk_meta::migration::applied_migrations;
use lk_meta::query::{execute_query, list_tables, table_row_count};

use crate::cli::{GlobalArgs, MetaArgs, MetaCommands, MetaQueryArgs};
use crate::commands::common::{print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the meta command.
pub(crate) async fn execute(args: &MetaArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        MetaCommands::Query(query_args) => execute_sql(query_args, global),
        MetaCommands::Tables => execute_tables(global),
        MetaCommands::Migrations => execute_migrations(global),
    }
}

fn execute_sql(args: &MetaQueryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let result = execute_query(ctx.db.conn(), &args.sql).context("Failed to execute query")?;

    if args.json {
        return print_json(&result.to_json_rows());
    }
    if result.rows.is_empty() {
        println!("(0 rows)");
        return Ok(());
    }
    let headers: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    print_table(&headers, &result.rows);
    println!("\n({} rows)", result.rows.len());
    Ok(())
}

fn execute_tables(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.db.conn();
    let tables = list_tables(conn).context("Failed to list monitoring tables")?;

    println!("Monitoring database tables:");
    for table in &tables {
        match table_row_count(conn, table) {
            Ok(count) => println!("  {:<40} {:>6} rows", table, count),
            Err(e) => println!("  {:<40} error: {e}", table),
        }
    }
    Ok(())
}

fn execute_migrations(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let applied = applied_migrations(ctx.db.conn()).context("Failed to read schema registry")?;
    let rows: Vec<Vec<String>> = applied
        .iter()
        .map(|m| vec![m.version.to_string(), m.name.clone(), m.applied_at.clone()])
        .collect();
    print_table(&["VERSION", "NAME", "APPLIED_AT"], &rows);
    Ok(())
}
