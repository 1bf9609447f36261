use super::*;

fn stats(live: u64, dead: u64) -> TableStats {
    TableStats {
        schema: "curated".to_string(),
        table: "games".to_string(),
        live_tuples: live,
        dead_tuples: dead,
    }
}

#[test]
fn test_ratio_above_one() {
    let sample = DeadTupleSample::compute(&stats(100, 120), &DeadTupleConfig::default()).unwrap();
    assert_eq!(sample.dead_ratio, 1.2);
    assert!(sample.vacuum_recommended);
    assert_eq!(sample.alert_severity(&DeadTupleConfig::default()), Some(Severity::Critical));
}

#[test]
fn test_ratio_rounds_to_four_places() {
    assert_eq!(dead_ratio(3, 1), 0.3333);
    assert_eq!(dead_ratio(3, 2), 0.6667);
}

#[test]
fn test_threshold_is_exclusive() {
    let cfg = DeadTupleConfig::default();
    let at = DeadTupleSample::compute(&stats(100, 50), &cfg).unwrap();
    assert!(!at.vacuum_recommended);
    assert_eq!(at.alert_severity(&cfg), None);

    let above = DeadTupleSample::compute(&stats(100, 51), &cfg).unwrap();
    assert!(above.vacuum_recommended);
    assert_eq!(above.alert_severity(&cfg), Some(Severity::Warning));
}

#[test]
fn test_empty_table() {
    assert_eq!(dead_ratio(0, 0), 0.0);
    assert_eq!(dead_ratio(0, 7), 7.0);
}

#[test]
fn test_blank_names_rejected() {
    let mut s = stats(1, 1);
    s.table = "  ".to_string();
    assert!(DeadTupleSample::compute(&s, &DeadTupleConfig::default()).is_err());
}

#[test]
fn test_qualified_name() {
    let sample = DeadTupleSample::compute(&stats(10, 1), &DeadTupleConfig::default()).unwrap();
    assert_eq!(sample.qualified_name(), "curated.games");
}

#[test]
fn test_feed_deserializes() {
    let json = r#"[{"schema": "raw", "table": "odds", "live_tuples": 10, "dead_tuples": 2}]"#;
    let feed: Vec<TableStats> = serde_json::from_str(json).unwrap();
    assert_eq!(feed, vec![TableStats {
        schema: "raw".to_string(),
        table: "odds".to_string(),
        live_tuples: 10,
        dead_tuples: 2,
    }]);
}

#[test]
fn test_critical_ratio_below_threshold_rejected() {
    let cfg = DeadTupleConfig {
        threshold_ratio: 0.6,
        critical_ratio: 0.4,
        ..DeadTupleConfig::default()
    };
    assert!(matches!(cfg.validate(), Err(CoreError::ConfigInvalid { .. })));

    let equal = DeadTupleConfig {
        critical_ratio: 0.6,
        ..cfg
    };
    assert!(equal.validate().is_ok());
}
