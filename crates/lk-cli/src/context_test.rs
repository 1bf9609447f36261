use super::*;
use std::fs;

fn args(config: Option<&Path>, database: Option<&str>) -> GlobalArgs {
    GlobalArgs {
        verbose: false,
        config: config.map(|p| p.display().to_string()),
        database: database.map(str::to_string),
    }
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yml");
    assert!(load_config(&args(Some(&missing), None)).is_err());
}

#[test]
fn database_resolves_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_file = dir.path().join("linekeeper.yml");
    fs::write(&config_file, "name: test\ndatabase:\n  path: data/monitor.duckdb\n").unwrap();

    let global = args(Some(&config_file), None);
    let config = load_config(&global).unwrap();
    let root = config_root(&global);
    assert_eq!(root, dir.path());
    assert_eq!(
        config.database_file(&root, Some("data/monitor.duckdb")),
        Some(dir.path().join("data/monitor.duckdb"))
    );
}

#[test]
fn runtime_context_opens_database() {
    let dir = tempfile::tempdir().unwrap();
    let config_file = dir.path().join("linekeeper.yml");
    fs::write(&config_file, "name: ctx\n").unwrap();
    let db_path = dir.path().join("nested").join("lk.duckdb");

    let ctx = RuntimeContext::new(&args(Some(&config_file), Some(&db_path.display().to_string()))).unwrap();
    assert_eq!(ctx.config.name, "ctx");
    assert!(db_path.exists());
    assert_eq!(ctx.resolve_path("feed.json"), dir.path().join("feed.json"));
}

#[test]
fn memory_database_override() {
    let dir = tempfile::tempdir().unwrap();
    let config_file = dir.path().join("linekeeper.yml");
    fs::write(&config_file, "name: mem\n").unwrap();
    let ctx = RuntimeContext::new(&args(Some(&config_file), Some(":memory:"))).unwrap();
    let count = lk_meta::query::table_row_count(ctx.db.conn(), "quality_config").unwrap();
    assert!(count > 0);
}
