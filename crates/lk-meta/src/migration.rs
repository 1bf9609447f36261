//! Schema migration runner and registry.
//!
//! Tracks applied migration versions in `lk_meta.schema_version` and runs any
//! unapplied migrations on each open.

use crate::ddl::MIGRATIONS;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use duckdb::Connection;
use serde::Serialize;

/// A migration recorded in the schema registry.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub version: i32,
    pub name: String,
    pub applied_at: String,
}

/// Ensure the `lk_meta` schema and `schema_version` table exist.
fn ensure_version_table(conn: &Connection) -> MetaResult<()> {
    conn.execute_batch(
        "CREATE SCHEMA IF NOT EXISTS lk_meta;
         CREATE TABLE IF NOT EXISTS lk_meta.schema_version (
             version    INTEGER NOT NULL,
             name       VARCHAR NOT NULL,
             applied_at TIMESTAMP NOT NULL DEFAULT now()
         );",
    )
    .map_err(|e| {
        MetaError::MigrationError(format!("failed to create schema_version table: {e}"))
    })?;
    Ok(())
}

/// Return the highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> MetaResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM lk_meta.schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MetaError::MigrationError(format!("failed to read schema version: {e}")))?;
    Ok(version)
}

/// Run all unapplied migrations against `conn`.
///
/// A migration and its registry row are applied in one transaction, so a
/// failed migration leaves no partial schema behind.
pub fn run_migrations(conn: &Connection) -> MetaResult<()> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        log::debug!(
            "Applying migration v{:03}_{}",
            migration.version,
            migration.name
        );

        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| MetaError::TransactionError(format!("BEGIN failed: {e}")))?;

        let applied = conn
            .execute_batch(migration.sql)
            .map_err(|e| {
                MetaError::MigrationError(format!(
                    "migration v{:03} failed: {e}",
                    migration.version
                ))
            })
            .and_then(|_| {
                conn.execute(
                    "INSERT INTO lk_meta.schema_version (version, name) VALUES (?, ?)",
                    duckdb::params![migration.version, migration.name],
                )
                .map_err(|e| {
                    MetaError::MigrationError(format!(
                        "failed to record migration v{:03}: {e}",
                        migration.version
                    ))
                })
            });

        match applied {
            Ok(_) => conn
                .execute_batch("COMMIT")
                .map_err(|e| MetaError::TransactionError(format!("COMMIT failed: {e}")))?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }
    Ok(())
}

/// List applied migrations, oldest first.
pub fn applied_migrations(conn: &Connection) -> MetaResult<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare(
            "SELECT version, name, CAST(applied_at AS VARCHAR)
             FROM lk_meta.schema_version ORDER BY version",
        )
        .query_context("prepare schema_version")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                name: row.get(1)?,
                applied_at: row.get(2)?,
            })
        })
        .query_context("query schema_version")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect schema_version")?;
    Ok(rows)
}

/// Whether every known migration has been applied.
pub fn is_up_to_date(conn: &Connection) -> MetaResult<bool> {
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    Ok(current_version(conn)? >= latest)
}
