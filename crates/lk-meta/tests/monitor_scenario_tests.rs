//! End-to-end monitoring scenarios against a real DuckDB database.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lk_core::alert::{AlertConfig, AlertKind, Severity};
use lk_core::collection::{RunOutcome, RunStatus};
use lk_core::dead_tuple::{DeadTupleConfig, TableStats};
use lk_core::gap::GapConfig;
use lk_core::health::{AlertLevel, AlertLevelThresholds, HealthStatus, HealthThresholds};
use lk_core::quality::{GameFields, HIGH_CONFIDENCE_SCORE};
use lk_core::SourceName;
use lk_meta::alerts::{list_alerts, AlertFilter};
use lk_meta::collection::record_run;
use lk_meta::dead_tuples::{list_samples, record_samples};
use lk_meta::games::{batch_update_quality_scores, upsert_games, GameRecord};
use lk_meta::gaps::{detect_gaps, open_gaps};
use lk_meta::health::{current_health, refresh_health, HealthPolicy};
use lk_meta::quality_config::{audit_log, set_setting};
use lk_meta::MonitorDb;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
}

fn outcome(valid: u64) -> RunOutcome {
    RunOutcome {
        status: RunStatus::Success,
        records_collected: 100,
        records_valid: valid,
        records_invalid: 100 - valid,
        confidence_score: 0.9,
        avg_response_ms: Some(250.0),
        max_response_ms: Some(1200.0),
        error_message: None,
    }
}

#[test]
fn sbd_degrades_to_critical_with_one_alert() {
    let db = MonitorDb::open_memory().unwrap();
    let sbd = SourceName::parse("sbd").unwrap();
    let health = HealthThresholds::default();
    let levels = AlertLevelThresholds::default();
    let alerts = AlertConfig::default();
    let policy = HealthPolicy {
        health: &health,
        levels: &levels,
        alerts: &alerts,
    };

    // Success rate trends from 0.95 down to 0.40 over ten runs.
    let valid = [95, 89, 83, 77, 71, 64, 58, 52, 46, 40];
    let mut statuses = Vec::new();
    for (i, valid) in valid.into_iter().enumerate() {
        let ended = start() + Duration::minutes(5 * i as i64);
        record_run(&db, &sbd, ended - Duration::minutes(2), &outcome(valid), ended).unwrap();
        let refresh = refresh_health(&db, &[sbd.clone()], policy, ended).unwrap();
        statuses.extend(refresh.transitions.iter().map(|t| t.to));
    }

    assert_eq!(
        statuses,
        vec![HealthStatus::Healthy, HealthStatus::Degraded, HealthStatus::Critical]
    );

    let current = current_health(db.conn(), Some(&sbd)).unwrap();
    assert_eq!(current[0].status, HealthStatus::Critical);
    assert_eq!(current[0].alert_level, AlertLevel::Critical);
    assert!((current[0].metrics.as_ref().unwrap().success_rate - 0.46).abs() < 1e-9);

    let degradation: Vec<_> = list_alerts(db.conn(), &AlertFilter::default())
        .unwrap()
        .into_iter()
        .filter(|a| a.kind == AlertKind::Degradation)
        .collect();
    assert_eq!(degradation.len(), 1);
    assert_eq!(degradation[0].source, "sbd");
}

#[test]
fn full_cycle_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linekeeper.duckdb");
    let vsin = SourceName::parse("vsin").unwrap();
    let now = start();

    {
        let db = MonitorDb::open(&path).unwrap();
        record_run(&db, &vsin, now - Duration::hours(6), &outcome(90), now - Duration::hours(5)).unwrap();
        let gaps = detect_gaps(&db, &[vsin.clone()], &GapConfig::default(), &AlertConfig::default(), now)
            .unwrap();
        assert_eq!(gaps.opened, 1);

        let sweep = record_samples(
            &db,
            &[TableStats {
                schema: "curated".to_string(),
                table: "games".to_string(),
                live_tuples: 100,
                dead_tuples: 120,
            }],
            &DeadTupleConfig::default(),
            &AlertConfig::default(),
            now,
        )
        .unwrap();
        assert_eq!(sweep.vacuum_recommended, 1);

        set_setting(&db, HIGH_CONFIDENCE_SCORE, 0.90, "analyst", now).unwrap();

        let games: Vec<GameRecord> = (0..250)
            .map(|i| GameRecord {
                game_id: format!("2024-06-01-{i:03}"),
                home_team: "NYY".to_string(),
                away_team: "BOS".to_string(),
                game_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                fields: GameFields {
                    home_score: Some(4),
                    away_score: Some(2),
                    external_id: Some(format!("an-{i}")),
                    venue: Some("Yankee Stadium".to_string()),
                },
            })
            .collect();
        upsert_games(&db, &games, now).unwrap();
        let report = batch_update_quality_scores(&db, 100, 250, now).unwrap();
        let sizes: Vec<i64> = report.batches.iter().map(|b| b.updated).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(report.settings_version, 2);
    }

    let db = MonitorDb::open(&path).unwrap();
    assert_eq!(open_gaps(db.conn(), &vsin).unwrap().len(), 1);

    let samples = list_samples(db.conn(), None, true).unwrap();
    assert!((samples[0].sample.dead_ratio - 1.2).abs() < 1e-9);

    let audit = audit_log(db.conn(), None).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].old_value, Some(0.95));
    assert_eq!(audit[0].new_value, 0.90);

    let alerts = list_alerts(db.conn(), &AlertFilter::default()).unwrap();
    let kinds: Vec<(AlertKind, Severity)> = alerts.iter().map(|a| (a.kind, a.severity)).collect();
    assert!(kinds.contains(&(AlertKind::Gap, Severity::Warning)));
    assert!(kinds.contains(&(AlertKind::DeadTuple, Severity::Critical)));

    let avg: f64 = db
        .conn()
        .query_row("SELECT AVG(confidence_score) FROM curated.games", [], |row| row.get(0))
        .unwrap();
    assert!((avg - 0.90).abs() < 1e-9);
}
