use super::*;
use crate::collection::RunStatus;
use chrono::{Duration, TimeZone};

fn metrics(success_rate: f64, confidence: f64, gap_hours: f64, failures: u32) -> HealthMetrics {
    HealthMetrics {
        success_rate,
        confidence,
        gap_hours,
        consecutive_failures: failures,
        runs_considered: 3,
    }
}

fn run(id: i64, status: RunStatus, valid: u64, confidence: f64) -> CollectionRun {
    let started = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(id);
    CollectionRun {
        run_id: id,
        source: SourceName::parse("sbd").unwrap(),
        started_at: started,
        completed_at: Some(started + Duration::minutes(5)),
        status,
        records_collected: 100,
        records_valid: valid,
        records_invalid: 100 - valid,
        confidence_score: confidence,
        avg_response_ms: None,
        max_response_ms: None,
        error_message: None,
    }
}

#[test]
fn test_healthy_example() {
    let t = HealthThresholds::default();
    let m = metrics(0.95, 0.9, 0.0, 0);
    assert_eq!(classify_health(Some(&m), &t), HealthStatus::Healthy);
}

#[test]
fn test_low_success_rate_is_critical_regardless_of_rest() {
    let t = HealthThresholds::default();
    for (confidence, gap, failures) in [(1.0, 0.0, 0), (0.9, 0.5, 1), (0.1, 10.0, 9)] {
        let m = metrics(0.3, confidence, gap, failures);
        assert_eq!(classify_health(Some(&m), &t), HealthStatus::Critical);
    }
}

#[test]
fn test_no_metrics_is_unknown() {
    assert_eq!(
        classify_health(None, &HealthThresholds::default()),
        HealthStatus::Unknown
    );
    assert_eq!(
        classify_alert_level(None, &AlertLevelThresholds::default()),
        AlertLevel::Normal
    );
}

#[test]
fn test_degraded_band() {
    let t = HealthThresholds::default();
    // Each input on its own falls between healthy and critical.
    assert_eq!(classify_health(Some(&metrics(0.7, 0.9, 0.0, 0)), &t), HealthStatus::Degraded);
    assert_eq!(classify_health(Some(&metrics(0.95, 0.6, 0.0, 0)), &t), HealthStatus::Degraded);
    assert_eq!(classify_health(Some(&metrics(0.95, 0.9, 2.0, 0)), &t), HealthStatus::Degraded);
    assert_eq!(classify_health(Some(&metrics(0.95, 0.9, 0.0, 3)), &t), HealthStatus::Degraded);
}

#[test]
fn test_critical_boundaries_are_inclusive_for_gap_and_failures() {
    let t = HealthThresholds::default();
    assert_eq!(classify_health(Some(&metrics(0.95, 0.9, 4.0, 0)), &t), HealthStatus::Critical);
    assert_eq!(classify_health(Some(&metrics(0.95, 0.9, 0.0, 5)), &t), HealthStatus::Critical);
    assert_eq!(classify_health(Some(&metrics(0.5, 0.5, 3.99, 4)), &t), HealthStatus::Degraded);
}

#[test]
fn test_healthy_boundaries() {
    let t = HealthThresholds::default();
    assert_eq!(classify_health(Some(&metrics(0.9, 0.8, 0.99, 2)), &t), HealthStatus::Healthy);
    assert_eq!(classify_health(Some(&metrics(0.9, 0.8, 1.0, 2)), &t), HealthStatus::Degraded);
}

#[test]
fn test_alert_levels_use_their_own_boundaries() {
    let t = AlertLevelThresholds::default();
    // Degraded health (success 0.85 < 0.9) but still above the 0.8 warning line.
    let m = metrics(0.85, 0.9, 0.0, 0);
    assert_eq!(classify_health(Some(&m), &HealthThresholds::default()), HealthStatus::Degraded);
    assert_eq!(classify_alert_level(Some(&m), &t), AlertLevel::Normal);

    assert_eq!(classify_alert_level(Some(&metrics(0.75, 0.9, 0.0, 0)), &t), AlertLevel::Warning);
    assert_eq!(classify_alert_level(Some(&metrics(0.95, 0.9, 2.5, 0)), &t), AlertLevel::Warning);
    assert_eq!(classify_alert_level(Some(&metrics(0.4, 0.9, 0.0, 0)), &t), AlertLevel::Critical);
}

#[test]
fn test_compute_metrics_averages_window() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    // Newest first: 60%, 80%, 100%, then an older run outside the window.
    let runs = vec![
        run(4, RunStatus::Success, 60, 0.6),
        run(3, RunStatus::Success, 80, 0.8),
        run(2, RunStatus::Success, 100, 1.0),
        run(1, RunStatus::Success, 0, 0.0),
    ];
    let last_success = runs[0].completed_at;
    let m = compute_metrics(&runs, last_success, Some(runs[3].started_at), now, 3).unwrap();
    assert!((m.success_rate - 0.8).abs() < 1e-9);
    assert!((m.confidence - 0.8).abs() < 1e-9);
    assert_eq!(m.runs_considered, 3);
    assert_eq!(m.consecutive_failures, 0);
    // Last success completed at 04:05, now is 12:00.
    assert!((m.gap_hours - (7.0 + 55.0 / 60.0)).abs() < 1e-9);
}

#[test]
fn test_compute_metrics_counts_trailing_failures() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let runs = vec![
        run(5, RunStatus::Failed, 0, 0.0),
        run(4, RunStatus::Failed, 0, 0.0),
        run(3, RunStatus::Success, 90, 0.9),
        run(2, RunStatus::Failed, 0, 0.0),
    ];
    let m = compute_metrics(&runs, runs[2].completed_at, None, now, 3).unwrap();
    assert_eq!(m.consecutive_failures, 2);
}

#[test]
fn test_compute_metrics_without_success_uses_first_start() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let runs = vec![run(2, RunStatus::Failed, 0, 0.0)];
    let first = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();
    let m = compute_metrics(&runs, None, Some(first), now, 3).unwrap();
    assert!((m.gap_hours - 6.0).abs() < 1e-9);
}

#[test]
fn test_compute_metrics_empty_history() {
    let now = Utc::now();
    assert!(compute_metrics(&[], None, None, now, 3).is_none());
}

#[test]
fn test_metrics_stay_in_unit_interval() {
    let now = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
    let runs: Vec<CollectionRun> = (0..10)
        .map(|i| run(i, RunStatus::Success, (i as u64 * 11) % 101, (i as f64) / 10.0))
        .collect();
    for window in 1..=10 {
        let m = compute_metrics(&runs, None, None, now, window).unwrap();
        assert!((0.0..=1.0).contains(&m.success_rate));
        assert!((0.0..=1.0).contains(&m.confidence));
    }
}

#[test]
fn test_thresholds_validation() {
    assert!(HealthThresholds::default().validate().is_ok());
    let bad = HealthThresholds {
        critical_confidence: 1.5,
        ..HealthThresholds::default()
    };
    assert!(bad.validate().is_err());
    let zero_window = HealthThresholds {
        window_runs: 0,
        ..HealthThresholds::default()
    };
    assert!(zero_window.validate().is_err());
}
