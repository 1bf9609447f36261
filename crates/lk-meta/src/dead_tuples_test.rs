use super::*;
use crate::alerts::{list_alerts, AlertFilter};
use chrono::{Duration, TimeZone};
use lk_core::alert::Severity;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

fn stats(table: &str, live: u64, dead: u64) -> TableStats {
    TableStats {
        schema: "curated".to_string(),
        table: table.to_string(),
        live_tuples: live,
        dead_tuples: dead,
    }
}

fn sweep(db: &MonitorDb, stats: &[TableStats], now: DateTime<Utc>) -> SweepReport {
    record_samples(db, stats, &DeadTupleConfig::default(), &AlertConfig::default(), now).unwrap()
}

#[test]
fn bloated_table_recommends_vacuum() {
    let db = MonitorDb::open_memory().unwrap();
    let report = sweep(&db, &[stats("games", 100, 120), stats("odds", 1000, 10)], at(1, 6));
    assert_eq!(report.inserted, 2);
    assert_eq!(report.vacuum_recommended, 1);
    assert_eq!(report.alerts_raised, 1);

    let samples = list_samples(db.conn(), None, true).unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].sample.table_name, "games");
    assert!((samples[0].sample.dead_ratio - 1.2).abs() < 1e-9);
    assert!(samples[0].sample.vacuum_recommended);
    assert_eq!(samples[0].sample_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

    let alerts = list_alerts(db.conn(), &AlertFilter::default()).unwrap();
    assert_eq!(alerts[0].source, "curated.games");
    assert_eq!(alerts[0].kind, AlertKind::DeadTuple);
    assert_eq!(alerts[0].severity, Severity::Critical);
}

#[test]
fn same_day_sample_updates_row() {
    let db = MonitorDb::open_memory().unwrap();
    sweep(&db, &[stats("games", 100, 10)], at(1, 6));
    let report = sweep(&db, &[stats("games", 100, 20)], at(1, 18));
    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 0);

    let samples = list_samples(db.conn(), None, false).unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].sample.dead_tuples, 20);
    assert_eq!(samples[0].sampled_at, at(1, 18));

    sweep(&db, &[stats("games", 100, 20)], at(2, 6));
    assert_eq!(list_samples(db.conn(), None, false).unwrap().len(), 2);
    let since = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
    assert_eq!(list_samples(db.conn(), Some(since), false).unwrap().len(), 1);
}

#[test]
fn alert_suppressed_within_cooldown() {
    let db = MonitorDb::open_memory().unwrap();
    sweep(&db, &[stats("games", 100, 60)], at(1, 6));
    let again = sweep(&db, &[stats("games", 100, 60)], at(1, 6) + Duration::minutes(90));
    assert_eq!(again.alerts_raised, 0);
    let later = sweep(&db, &[stats("games", 100, 60)], at(1, 9));
    assert_eq!(later.alerts_raised, 1);

    let alerts = list_alerts(db.conn(), &AlertFilter::default()).unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].severity, Severity::Warning);
}

#[test]
fn blank_table_rejects_whole_sweep() {
    let db = MonitorDb::open_memory().unwrap();
    let result = record_samples(
        &db,
        &[stats("games", 100, 120), stats(" ", 1, 1)],
        &DeadTupleConfig::default(),
        &AlertConfig::default(),
        at(1, 6),
    );
    assert!(result.is_err());
    assert!(list_samples(db.conn(), None, false).unwrap().is_empty());
    assert!(list_alerts(db.conn(), &AlertFilter::default()).unwrap().is_empty());
}

#[test]
fn empty_table_with_dead_tuples() {
    let db = MonitorDb::open_memory().unwrap();
    sweep(&db, &[stats("staging", 0, 3)], at(1, 6));
    let samples = list_samples(db.conn(), None, false).unwrap();
    assert_eq!(samples[0].sample.dead_ratio, 3.0);
    assert!(samples[0].sample.vacuum_recommended);
}
