//! Table statistics feeds for the dead-tuple monitor.
//!
//! The warehouse host exports per-table live/dead tuple counts; Linekeeper
//! only reads them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lk_core::TableStats;
use std::path::PathBuf;

/// Anything that can produce a fresh set of table statistics.
#[async_trait]
pub(crate) trait TableStatsSource: Send + Sync {
    /// Human-readable origin, used in logs
    fn describe(&self) -> String;

    /// Fetch the current statistics.
    async fn fetch(&self) -> Result<Vec<TableStats>>;
}

/// A JSON file holding an array of `{schema, table, live_tuples, dead_tuples}`.
#[derive(Debug, Clone)]
pub(crate) struct JsonStatsFeed {
    path: PathBuf,
}

impl JsonStatsFeed {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TableStatsSource for JsonStatsFeed {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<TableStats>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read stats feed {}", self.path.display()))?;
        let stats: Vec<TableStats> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid stats feed {}", self.path.display()))?;
        log::debug!("Read {} table statistics from {}", stats.len(), self.path.display());
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "stats_feed_test.rs"]
mod tests;
