//! Monitoring database connection wrapper.
//!
//! [`MonitorDb`] owns a DuckDB [`Connection`] and provides helpers for opening,
//! migrating, and transacting against the monitoring database.

use crate::error::{MetaError, MetaResult};
use crate::migration::run_migrations;
use crate::quality_config::seed_defaults;
use duckdb::Connection;
use std::path::Path;
use std::time::Instant;

/// Wrapper around a DuckDB connection to the monitoring database.
///
/// A `MonitorDb` is `Send` but not `Sync`. Concurrent jobs each work on their
/// own handle obtained from [`MonitorDb::try_clone`]; clones share the same
/// underlying database.
pub struct MonitorDb {
    conn: Connection,
    deadline: Option<Instant>,
}

impl MonitorDb {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> MetaResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MetaError::ConnectionError(format!("{e}: {}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| MetaError::ConnectionError(format!("{e}: {}", path.display())))?;
        Self::prepare(conn)
    }

    /// Create an in-memory database with all migrations applied.
    pub fn open_memory() -> MetaResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| MetaError::ConnectionError(e.to_string()))?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> MetaResult<Self> {
        run_migrations(&conn)?;
        seed_defaults(&conn)?;
        Ok(Self {
            conn,
            deadline: None,
        })
    }

    /// Borrow the underlying DuckDB connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open another connection to the same database.
    pub fn try_clone(&self) -> MetaResult<Self> {
        let conn = self
            .conn
            .try_clone()
            .map_err(|e| MetaError::ConnectionError(format!("clone failed: {e}")))?;
        Ok(Self {
            conn,
            deadline: None,
        })
    }

    /// Attach a deadline. Every later [`MonitorDb::transaction`] that finishes
    /// its body after the deadline is rolled back instead of committed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on
    /// error or when the deadline has passed.
    pub fn transaction<F, T>(&self, body: F) -> MetaResult<T>
    where
        F: FnOnce(&Connection) -> MetaResult<T>,
    {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| MetaError::TransactionError(format!("BEGIN failed: {e}")))?;

        let result = body(&self.conn).and_then(|value| match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(MetaError::Timeout(
                "transaction body finished after the job deadline".to_string(),
            )),
            _ => Ok(value),
        });

        match &result {
            Ok(_) => {
                if let Err(commit_err) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(MetaError::TransactionError(format!(
                        "COMMIT failed: {commit_err}"
                    )));
                }
            }
            Err(_) => {
                let _ = self.conn.execute_batch("ROLLBACK");
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
