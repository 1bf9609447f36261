//! Read-side helpers for `lk meta` commands.
//!
//! - [`adhoc`] - Ad-hoc SQL queries, table listing, row counts

pub mod adhoc;

pub use adhoc::{execute_query, list_tables, table_row_count, QueryResult};
