use super::*;
use chrono::{Duration, TimeZone};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

fn source(name: &str) -> SourceName {
    SourceName::parse(name).unwrap()
}

fn outcome(status: RunStatus, collected: u64, valid: u64) -> RunOutcome {
    RunOutcome {
        status,
        records_collected: collected,
        records_valid: valid,
        records_invalid: collected - valid,
        confidence_score: 0.9,
        avg_response_ms: Some(120.0),
        max_response_ms: Some(900.0),
        error_message: None,
    }
}

#[test]
fn begin_then_complete() {
    let db = MonitorDb::open_memory().unwrap();
    let run_id = begin_run(&db, &source("sbd"), at(10)).unwrap();

    let open = get_run(db.conn(), run_id).unwrap().unwrap();
    assert_eq!(open.status, RunStatus::Running);
    assert!(open.completed_at.is_none());

    let run = complete_run(&db, run_id, &outcome(RunStatus::Success, 100, 95), at(11)).unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.completed_at, Some(at(11)));
    assert_eq!(run.records_valid, 95);
    assert_eq!(run.avg_response_ms, Some(120.0));
    assert!((run.success_rate() - 0.95).abs() < 1e-9);
}

#[test]
fn completing_closed_run_fails() {
    let db = MonitorDb::open_memory().unwrap();
    let run_id = begin_run(&db, &source("sbd"), at(10)).unwrap();
    complete_run(&db, run_id, &outcome(RunStatus::Failed, 0, 0), at(11)).unwrap();
    let err = complete_run(&db, run_id, &outcome(RunStatus::Success, 10, 10), at(12)).unwrap_err();
    assert!(matches!(err, MetaError::RunClosed { .. }));
}

#[test]
fn complete_unknown_run_not_found() {
    let db = MonitorDb::open_memory().unwrap();
    let err = complete_run(&db, 42, &outcome(RunStatus::Success, 1, 1), at(11)).unwrap_err();
    assert!(matches!(err, MetaError::NotFound { .. }));
}

#[test]
fn invalid_outcome_rejected_without_mutation() {
    let db = MonitorDb::open_memory().unwrap();
    let mut bad = outcome(RunStatus::Success, 10, 10);
    bad.confidence_score = 1.2;
    assert!(matches!(
        record_run(&db, &source("sbd"), at(10), &bad, at(11)),
        Err(MetaError::Core(CoreError::InvalidArgument { .. }))
    ));

    let mut counts = outcome(RunStatus::Success, 10, 10);
    counts.records_invalid = 5;
    assert!(record_run(&db, &source("sbd"), at(10), &counts, at(11)).is_err());

    assert!(sources_with_runs(db.conn()).unwrap().is_empty());
}

#[test]
fn completion_before_start_rejected() {
    let db = MonitorDb::open_memory().unwrap();
    let run_id = begin_run(&db, &source("sbd"), at(10)).unwrap();
    let err = complete_run(&db, run_id, &outcome(RunStatus::Success, 1, 1), at(9)).unwrap_err();
    assert!(matches!(err, MetaError::Core(_)));
    let run = get_run(db.conn(), run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
}

#[test]
fn recent_runs_newest_first_and_closed_only() {
    let db = MonitorDb::open_memory().unwrap();
    let sbd = source("sbd");
    for hour in [1, 2, 3, 4] {
        record_run(&db, &sbd, at(hour), &outcome(RunStatus::Success, 10, 10), at(hour) + Duration::minutes(5))
            .unwrap();
    }
    begin_run(&db, &sbd, at(5)).unwrap();

    let runs = recent_runs(db.conn(), &sbd, 3).unwrap();
    let starts: Vec<_> = runs.iter().map(|r| r.started_at).collect();
    assert_eq!(starts, vec![at(4), at(3), at(2)]);
}

#[test]
fn last_success_ignores_failures() {
    let db = MonitorDb::open_memory().unwrap();
    let sbd = source("sbd");
    assert_eq!(last_success_at(db.conn(), &sbd).unwrap(), None);

    record_run(&db, &sbd, at(1), &outcome(RunStatus::Partial, 10, 6), at(2)).unwrap();
    record_run(&db, &sbd, at(3), &outcome(RunStatus::Failed, 0, 0), at(4)).unwrap();

    assert_eq!(last_success_at(db.conn(), &sbd).unwrap(), Some(at(2)));
    assert_eq!(first_started_at(db.conn(), &sbd).unwrap(), Some(at(1)));
}

#[test]
fn valid_records_window() {
    let db = MonitorDb::open_memory().unwrap();
    let sbd = source("sbd");
    record_run(&db, &sbd, at(1), &outcome(RunStatus::Success, 50, 40), at(2)).unwrap();
    record_run(&db, &sbd, at(5), &outcome(RunStatus::Success, 50, 30), at(6)).unwrap();
    record_run(&db, &sbd, at(7), &outcome(RunStatus::Failed, 50, 20), at(8)).unwrap();

    assert_eq!(valid_records_between(db.conn(), &sbd, at(0), at(12)).unwrap(), 70);
    assert_eq!(valid_records_between(db.conn(), &sbd, at(3), at(12)).unwrap(), 30);
}

#[test]
fn known_sources_merges_configured_and_observed() {
    let db = MonitorDb::open_memory().unwrap();
    record_run(&db, &source("pinnacle"), at(1), &outcome(RunStatus::Success, 1, 1), at(2)).unwrap();
    record_run(&db, &source("sbd"), at(1), &outcome(RunStatus::Success, 1, 1), at(2)).unwrap();

    let known = known_sources(db.conn(), &[source("sbd"), source("vsin")]).unwrap();
    assert_eq!(known, vec![source("sbd"), source("vsin"), source("pinnacle")]);
}
