use super::*;
use chrono::{Duration, TimeZone};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn identity(canonical: &str, ids: &[(Provider, &str)], confidence: f64) -> GameIdentity {
    GameIdentity::new(
        CanonicalGameId::parse(canonical).unwrap(),
        ids.iter().map(|(p, id)| (*p, id.to_string())).collect(),
        confidence,
        None,
        now(),
    )
    .unwrap()
}

#[test]
fn register_and_resolve() {
    let db = MonitorDb::open_memory().unwrap();
    let game = identity(
        "2024-06-01-NYY-BOS",
        &[(Provider::ActionNetwork, "an-1"), (Provider::MlbStatsApi, "745001")],
        0.95,
    );
    register_identity(&db, &game, now()).unwrap();

    let resolved = resolve(db.conn(), Provider::MlbStatsApi, " 745001 ").unwrap();
    assert_eq!(resolved.unwrap(), "2024-06-01-NYY-BOS");
    assert!(resolve(db.conn(), Provider::Vsin, "745001").unwrap().is_none());

    let stored = get_identity(db.conn(), "2024-06-01-NYY-BOS").unwrap().unwrap();
    assert_eq!(stored, game);
    assert_eq!(stored.primary_source, Provider::ActionNetwork);
}

#[test]
fn duplicate_canonical_rejected() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("g1", &[(Provider::Sbd, "s1")], 0.9), now()).unwrap();
    let err = register_identity(&db, &identity("g1", &[(Provider::Vsin, "v1")], 0.9), now()).unwrap_err();
    assert!(matches!(err, MetaError::Core(CoreError::DuplicateIdentity { .. })));
    assert!(resolve(db.conn(), Provider::Vsin, "v1").unwrap().is_none());
}

#[test]
fn external_id_maps_to_one_game() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("g1", &[(Provider::Sbd, "s1")], 0.9), now()).unwrap();
    let err = register_identity(
        &db,
        &identity("g2", &[(Provider::Vsin, "v2"), (Provider::Sbd, "s1")], 0.9),
        now(),
    )
    .unwrap_err();
    match err {
        MetaError::Core(CoreError::IdentityConflict { existing, .. }) => assert_eq!(existing, "g1"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(get_identity(db.conn(), "g2").unwrap().is_none());
    assert!(resolve(db.conn(), Provider::Vsin, "v2").unwrap().is_none());
}

#[test]
fn add_mapping_rules() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("g1", &[(Provider::Sbd, "s1")], 0.9), now()).unwrap();
    register_identity(&db, &identity("g2", &[(Provider::Sbd, "s2")], 0.9), now()).unwrap();

    assert!(add_mapping(&db, "g1", Provider::Vsin, "v1", now()).unwrap());
    assert!(!add_mapping(&db, "g1", Provider::Vsin, "v1", now()).unwrap());
    assert!(add_mapping(&db, "g1", Provider::Vsin, "v9", now()).is_err());
    assert!(matches!(
        add_mapping(&db, "g2", Provider::Vsin, "v1", now()),
        Err(MetaError::Core(CoreError::IdentityConflict { .. }))
    ));
    assert!(matches!(
        add_mapping(&db, "missing", Provider::Vsin, "v3", now()),
        Err(MetaError::NotFound { .. })
    ));
    assert!(add_mapping(&db, "g1", Provider::MlbStatsApi, "  ", now()).is_err());

    let g1 = get_identity(db.conn(), "g1").unwrap().unwrap();
    assert_eq!(g1.external_id(Provider::Vsin), Some("v1"));
}

#[test]
fn verify_updates_confidence_and_time() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("g1", &[(Provider::Sbd, "s1")], 0.6), now()).unwrap();

    let later = now() + Duration::days(2);
    let verified = verify(&db, "g1", 0.92, later).unwrap();
    assert_eq!(verified.resolution_confidence, 0.92);
    assert_eq!(verified.last_verified_at, later);

    assert!(verify(&db, "g1", 1.1, later).is_err());
    assert!(matches!(verify(&db, "nope", 0.9, later), Err(MetaError::NotFound { .. })));
}

#[test]
fn review_flags_low_and_stale() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("fresh", &[(Provider::Sbd, "s1")], 0.95), now()).unwrap();
    register_identity(&db, &identity("shaky", &[(Provider::Sbd, "s2")], 0.7), now()).unwrap();
    register_identity(
        &db,
        &GameIdentity::new(
            CanonicalGameId::parse("old").unwrap(),
            [(Provider::Vsin, "v3".to_string())].into_iter().collect(),
            0.9,
            None,
            now() - Duration::days(45),
        )
        .unwrap(),
        now(),
    )
    .unwrap();

    let review = review_identities(db.conn(), now(), &IdentityConfig::default()).unwrap();
    let flagged: Vec<(&str, bool, bool)> = review
        .iter()
        .map(|r| (r.identity.canonical_id.as_str(), r.flags.needs_reverification, r.flags.stale))
        .collect();
    assert_eq!(flagged, vec![("old", false, true), ("shaky", true, false)]);
}

#[test]
fn index_loads_all_identities() {
    let db = MonitorDb::open_memory().unwrap();
    register_identity(&db, &identity("g1", &[(Provider::Sbd, "s1"), (Provider::Vsin, "v1")], 0.9), now())
        .unwrap();
    register_identity(&db, &identity("g2", &[(Provider::ActionNetwork, "a2")], 0.9), now()).unwrap();

    let index = load_index(db.conn()).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.resolve(Provider::Vsin, "v1").unwrap(), "g1");
    assert_eq!(index.resolve(Provider::ActionNetwork, "a2").unwrap(), "g2");
}
