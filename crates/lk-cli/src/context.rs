//! Runtime context for CLI commands

use anyhow::{Context, Result};
use lk_core::config::CONFIG_FILE_NAME;
use lk_core::Config;
use lk_meta::MonitorDb;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Runtime context containing the loaded configuration and database handle
pub(crate) struct RuntimeContext {
    /// Parsed linekeeper.yml (or defaults when the file is absent)
    pub config: Config,

    /// Directory relative paths in the configuration resolve against
    pub root: PathBuf,

    /// Monitoring database
    pub db: MonitorDb,

    /// Verbose output enabled
    pub verbose: bool,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub(crate) fn new(args: &GlobalArgs) -> Result<Self> {
        let config = load_config(args)?;
        let root = config_root(args);
        let db = open_database(&config, &root, args.database.as_deref())?;
        if args.verbose {
            eprintln!("[verbose] Loaded configuration '{}'", config.name);
        }
        Ok(Self {
            config,
            root,
            db,
            verbose: args.verbose,
        })
    }

    /// Print verbose output if enabled
    pub(crate) fn verbose(&self, msg: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", msg);
        }
    }

    /// Resolve a path from the configuration against the config directory.
    pub(crate) fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Path of the configuration file named by `--config`, or the default.
pub(crate) fn config_path(args: &GlobalArgs) -> PathBuf {
    PathBuf::from(args.config.as_deref().unwrap_or(CONFIG_FILE_NAME))
}

/// Directory containing the configuration file.
pub(crate) fn config_root(args: &GlobalArgs) -> PathBuf {
    config_path(args)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load the configuration. An explicit `--config` must exist; the default
/// file falls back to built-in defaults.
pub(crate) fn load_config(args: &GlobalArgs) -> Result<Config> {
    let path = config_path(args);
    if args.config.is_some() {
        Config::load(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))
    } else {
        Config::load_or_default(&path).context("Failed to load configuration")
    }
}

/// Open the monitoring database, creating and migrating it if needed.
pub(crate) fn open_database(
    config: &Config,
    root: &Path,
    cli_override: Option<&str>,
) -> Result<MonitorDb> {
    match config.database_file(root, cli_override) {
        Some(path) => MonitorDb::open(&path)
            .with_context(|| format!("Failed to open monitoring database {}", path.display())),
        None => MonitorDb::open_memory().context("Failed to open in-memory monitoring database"),
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
