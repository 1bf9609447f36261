//! Ad-hoc query execution and table introspection helpers.
//!
//! Returns plain Rust types so callers don't need a direct `duckdb` dependency.

use crate::error::{MetaError, MetaResult};
use crate::row_helpers::get_column_as_string;
use duckdb::Connection;
use serde::Serialize;

/// Schemas owned by Linekeeper
pub const SCHEMAS: [&str; 2] = ["lk_meta", "curated"];

/// Result of an ad-hoc SQL query against the monitoring database.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column names from the result set.
    pub columns: Vec<String>,
    /// Rows of string-coerced values.
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// Rows as JSON objects keyed by column name. SQL NULL becomes JSON null.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, val)| {
                        let json_val = if val == "null" {
                            serde_json::Value::Null
                        } else {
                            serde_json::Value::String(val.clone())
                        };
                        (col.clone(), json_val)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Execute an ad-hoc SQL query and return all results as strings.
///
/// DuckDB panics on `stmt.column_count()` before execution, so rows are
/// collected via `query_map` first and column metadata is read afterwards.
pub fn execute_query(conn: &Connection, sql: &str) -> MetaResult<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| MetaError::QueryError(format!("prepare failed: {e}")))?;

    let rows: Vec<Vec<String>> = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            Ok((0..col_count).map(|i| get_column_as_string(row, i)).collect())
        })
        .map_err(|e| MetaError::QueryError(format!("query failed: {e}")))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MetaError::QueryError(format!("row error: {e}")))?;

    let columns = (0..stmt.column_count())
        .map(|i| stmt.column_name(i).map_or("?".to_string(), |v| v.to_string()))
        .collect();

    Ok(QueryResult { columns, rows })
}

/// List tables and views in the Linekeeper schemas as `schema.name`.
pub fn list_tables(conn: &Connection) -> MetaResult<Vec<String>> {
    let result = execute_query(
        conn,
        "SELECT table_schema || '.' || table_name FROM information_schema.tables \
         WHERE table_schema IN ('lk_meta', 'curated') \
         ORDER BY table_schema, table_name",
    )?;
    Ok(result.rows.into_iter().filter_map(|r| r.into_iter().next()).collect())
}

/// Row count for a `schema.table` (or bare `lk_meta` table) name.
pub fn table_row_count(conn: &Connection, table_name: &str) -> MetaResult<i64> {
    let (schema, table) = table_name.split_once('.').unwrap_or(("lk_meta", table_name));
    let valid_ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !SCHEMAS.contains(&schema) || !valid_ident(table) {
        return Err(MetaError::QueryError(format!(
            "invalid table name '{table_name}': expected [lk_meta.|curated.]<name> with alphanumeric characters and underscores"
        )));
    }
    conn.query_row(&format!("SELECT COUNT(*) FROM {schema}.{table}"), [], |row| row.get(0))
        .map_err(|e| MetaError::QueryError(format!("count failed for {table_name}: {e}")))
}

#[cfg(test)]
#[path = "adhoc_test.rs"]
mod tests;
