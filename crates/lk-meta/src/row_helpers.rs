//! Shared helpers for binding and reading DuckDB values.
//!
//! Timestamps cross the driver boundary as text on the way in
//! (`CAST(? AS TIMESTAMP)`) and as epoch microseconds on the way out
//! (`epoch_us(col)`), so no driver-side chrono support is needed.

use chrono::{DateTime, NaiveDate, Utc};
use duckdb::types::{Type, Value};
use lk_core::CoreResult;

/// Format a UTC timestamp for `CAST(? AS TIMESTAMP)`.
pub(crate) fn ts(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Format a UTC day for `CAST(? AS DATE)`.
pub(crate) fn day(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

#[derive(Debug, thiserror::Error)]
#[error("timestamp {0}us is out of range")]
struct OutOfRange(i64);

/// Read an `epoch_us(...)` column as a UTC timestamp.
pub(crate) fn get_ts(row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| conversion_error(idx, Type::BigInt, OutOfRange(micros)))
}

/// Read a nullable `epoch_us(...)` column.
pub(crate) fn get_opt_ts(
    row: &duckdb::Row<'_>,
    idx: usize,
) -> duckdb::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(micros) => DateTime::from_timestamp_micros(micros)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, Type::BigInt, OutOfRange(micros))),
        None => Ok(None),
    }
}

/// Read a `CAST(col AS VARCHAR)` date column.
pub(crate) fn get_date(row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Read a text column through a domain parser such as `RunStatus::parse`.
pub(crate) fn get_parsed<T>(
    row: &duckdb::Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> CoreResult<T>,
) -> duckdb::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Read a nullable text column through a domain parser.
pub(crate) fn get_opt_parsed<T>(
    row: &duckdb::Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> CoreResult<T>,
) -> duckdb::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => parse(&text)
            .map(Some)
            .map_err(|e| conversion_error(idx, Type::Text, e)),
        None => Ok(None),
    }
}

/// Read a non-negative BIGINT count.
pub(crate) fn get_count(row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value.max(0) as u64)
}

/// Bind a count as BIGINT.
pub(crate) fn count_param(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Read a column value as a String, trying multiple DuckDB types.
///
/// DuckDB integer columns return `None` for `Option<String>`, so we try
/// String -> timestamp/date -> i64 -> f64 -> bool -> "null".
pub(crate) fn get_column_as_string(row: &duckdb::Row<'_>, idx: usize) -> String {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return s;
    }
    match row.get::<_, Value>(idx) {
        Ok(Value::Timestamp(unit, raw)) => {
            if let Some(dt) = DateTime::from_timestamp_micros(unit.to_micros(raw)) {
                return ts(&dt);
            }
        }
        Ok(Value::Date32(days)) => {
            if let Some(date) = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            {
                return date.to_string();
            }
        }
        _ => {}
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return n.to_string();
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return f.to_string();
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return b.to_string();
    }
    "null".to_string()
}
