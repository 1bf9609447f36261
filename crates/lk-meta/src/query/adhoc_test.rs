use super::*;
use crate::MonitorDb;

fn open_db() -> MonitorDb {
    MonitorDb::open_memory().unwrap()
}

#[test]
fn execute_simple_query() {
    let db = open_db();
    let result = execute_query(db.conn(), "SELECT 42 AS answer, 'hello' AS greeting").unwrap();

    assert_eq!(result.columns, vec!["answer", "greeting"]);
    assert_eq!(result.rows, vec![vec!["42", "hello"]]);
}

#[test]
fn execute_invalid_sql_returns_error() {
    let db = open_db();
    assert!(execute_query(db.conn(), "SELECTTTT garbage").is_err());
}

#[test]
fn timestamps_render_readably() {
    let db = open_db();
    let result =
        execute_query(db.conn(), "SELECT TIMESTAMP '2024-06-01 12:30:00' AS at, DATE '2024-06-01' AS d").unwrap();
    assert_eq!(result.rows[0][0], "2024-06-01 12:30:00.000000");
    assert_eq!(result.rows[0][1], "2024-06-01");
}

#[test]
fn json_rows_keyed_by_column() {
    let db = open_db();
    let result = execute_query(db.conn(), "SELECT 1 AS a, 'x' AS b, NULL AS c").unwrap();
    let json = result.to_json_rows();
    assert_eq!(json[0]["a"], "1");
    assert_eq!(json[0]["b"], "x");
    assert!(json[0]["c"].is_null());
}

#[test]
fn list_tables_covers_both_schemas() {
    let db = open_db();
    let tables = list_tables(db.conn()).unwrap();
    for expected in [
        "curated.games",
        "lk_meta.alerts",
        "lk_meta.collection_runs",
        "lk_meta.quality_config",
        "lk_meta.v_active_alerts",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn row_counts() {
    let db = open_db();
    assert_eq!(table_row_count(db.conn(), "alerts").unwrap(), 0);
    assert_eq!(table_row_count(db.conn(), "curated.games").unwrap(), 0);
    assert_eq!(
        table_row_count(db.conn(), "lk_meta.quality_config").unwrap(),
        lk_core::quality::SETTINGS.len() as i64
    );
    assert!(table_row_count(db.conn(), "alerts; DROP TABLE x").is_err());
    assert!(table_row_count(db.conn(), "main.alerts").is_err());
}
