use super::*;

fn outcome() -> RunOutcome {
    RunOutcome {
        status: RunStatus::Success,
        records_collected: 100,
        records_valid: 95,
        records_invalid: 5,
        confidence_score: 0.9,
        avg_response_ms: Some(120.0),
        max_response_ms: Some(480.0),
        error_message: None,
    }
}

#[test]
fn test_valid_outcome_passes() {
    assert!(outcome().validate().is_ok());
}

#[test]
fn test_running_is_not_a_closing_status() {
    let o = RunOutcome {
        status: RunStatus::Running,
        ..outcome()
    };
    assert!(o.validate().is_err());
}

#[test]
fn test_confidence_out_of_range_rejected() {
    for bad in [1.2, -0.1, f64::NAN] {
        let o = RunOutcome {
            confidence_score: bad,
            ..outcome()
        };
        assert!(
            matches!(o.validate(), Err(CoreError::InvalidArgument { .. })),
            "confidence {bad} should be rejected"
        );
    }
}

#[test]
fn test_counts_must_fit_in_collected() {
    let o = RunOutcome {
        records_valid: 90,
        records_invalid: 20,
        ..outcome()
    };
    assert!(o.validate().is_err());
}

#[test]
fn test_overflowing_counts_rejected() {
    let o = RunOutcome {
        records_collected: 10,
        records_valid: u64::MAX,
        records_invalid: 1,
        ..outcome()
    };
    assert!(matches!(o.validate(), Err(CoreError::InvalidArgument { .. })));
}

#[test]
fn test_negative_response_time_rejected() {
    let o = RunOutcome {
        avg_response_ms: Some(-1.0),
        ..outcome()
    };
    assert!(o.validate().is_err());
}

#[test]
fn test_status_classification() {
    assert!(RunStatus::Success.is_successful());
    assert!(RunStatus::Partial.is_successful());
    assert!(!RunStatus::Failed.is_successful());
    assert!(!RunStatus::Running.is_closed());
    assert_eq!(RunStatus::parse("partial").unwrap(), RunStatus::Partial);
}

#[test]
fn test_success_rate_handles_empty_run() {
    let run = CollectionRun {
        run_id: 1,
        source: SourceName::parse("sbd").unwrap(),
        started_at: Utc::now(),
        completed_at: None,
        status: RunStatus::Failed,
        records_collected: 0,
        records_valid: 0,
        records_invalid: 0,
        confidence_score: 0.0,
        avg_response_ms: None,
        max_response_ms: None,
        error_message: Some("timeout".to_string()),
    };
    assert_eq!(run.success_rate(), 0.0);
}
