//! Init command implementation - writes a default configuration and creates
//! the monitoring database

use anyhow::{Context, Result};
use lk_core::Config;
use std::fs;

use crate::cli::{GlobalArgs, InitArgs};
use crate::context::{config_path, config_root, open_database};

/// Execute the init command
pub(crate) async fn execute(args: &InitArgs, global: &GlobalArgs) -> Result<()> {
    let path = config_path(global);
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }

    let root = config_root(global);
    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create directory: {}", root.display()))?;

    let yaml = Config::default_yaml().context("Failed to render default configuration")?;
    fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());

    // Reload so the written file is what the database path comes from
    let config = Config::load(&path).context("Failed to load generated configuration")?;
    let db = open_database(&config, &root, global.database.as_deref())?;
    let version = lk_meta::migration::current_version(db.conn())
        .context("Failed to read schema version")?;

    match config.database_file(&root, global.database.as_deref()) {
        Some(db_path) => println!(
            "Created monitoring database {} (schema version {version})",
            db_path.display()
        ),
        None => println!("Using an in-memory monitoring database (schema version {version})"),
    }
    println!("\nNext steps:");
    println!("  lk run submit --source sbd --records 100 --valid 95 --invalid 5 --confidence 0.9");
    println!("  lk health refresh");
    println!("  lk serve");
    Ok(())
}
