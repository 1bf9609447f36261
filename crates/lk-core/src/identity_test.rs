use super::*;
use chrono::TimeZone;

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, day, 12, 0, 0).unwrap()
}

fn ids(pairs: &[(Provider, &str)]) -> BTreeMap<Provider, String> {
    pairs.iter().map(|(p, id)| (*p, id.to_string())).collect()
}

fn identity(canonical: &str, pairs: &[(Provider, &str)]) -> GameIdentity {
    GameIdentity::new(
        CanonicalGameId::parse(canonical).unwrap(),
        ids(pairs),
        0.9,
        None,
        ts(1),
    )
    .unwrap()
}

#[test]
fn test_identity_requires_external_id() {
    let err = GameIdentity::new(
        CanonicalGameId::parse("g-1").unwrap(),
        BTreeMap::new(),
        0.9,
        None,
        ts(1),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::MissingExternalId { .. }));
}

#[test]
fn test_blank_external_id_rejected() {
    let err = GameIdentity::new(
        CanonicalGameId::parse("g-1").unwrap(),
        ids(&[(Provider::Vsin, "  ")]),
        0.9,
        None,
        ts(1),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}

#[test]
fn test_confidence_out_of_range_rejected() {
    let result = GameIdentity::new(
        CanonicalGameId::parse("g-1").unwrap(),
        ids(&[(Provider::Vsin, "v-1")]),
        1.5,
        None,
        ts(1),
    );
    assert!(result.is_err());
}

#[test]
fn test_primary_source_defaults_and_must_be_mapped() {
    let g = identity("g-1", &[(Provider::Sbd, "s-1"), (Provider::Vsin, "v-1")]);
    assert_eq!(g.primary_source, Provider::Vsin);

    let err = GameIdentity::new(
        CanonicalGameId::parse("g-2").unwrap(),
        ids(&[(Provider::Sbd, "s-2")]),
        0.9,
        Some(Provider::ActionNetwork),
        ts(1),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}

#[test]
fn test_external_ids_are_trimmed() {
    let g = identity("g-1", &[(Provider::MlbStatsApi, " 745123 ")]);
    assert_eq!(g.external_id(Provider::MlbStatsApi), Some("745123"));
    assert_eq!(g.external_id(Provider::Sbd), None);
}

#[test]
fn test_review_flags() {
    let cfg = IdentityConfig::default();
    let mut g = identity("g-1", &[(Provider::Vsin, "v-1")]);
    assert!(!g.review(ts(15), &cfg).any());

    g.resolution_confidence = 0.79;
    assert!(g.needs_reverification(&cfg));

    let later = ts(1) + Duration::days(31);
    assert!(g.is_stale(later, &cfg));
    assert!(!g.is_stale(ts(1) + Duration::days(30), &cfg));
}

#[test]
fn test_index_resolves_every_provider() {
    let index = IdentityIndex::try_from(vec![identity(
        "g-1",
        &[(Provider::ActionNetwork, "an-9"), (Provider::MlbStatsApi, "745123")],
    )])
    .unwrap();
    assert_eq!(
        index.resolve(Provider::ActionNetwork, "an-9").map(|c| c.as_str()),
        Some("g-1")
    );
    assert_eq!(
        index.resolve(Provider::MlbStatsApi, "745123").map(|c| c.as_str()),
        Some("g-1")
    );
    assert!(index.resolve(Provider::Vsin, "an-9").is_none());
    assert!(index.get("g-1").is_some());
}

#[test]
fn test_index_rejects_duplicate_canonical_id() {
    let mut index = IdentityIndex::new();
    index.insert(identity("g-1", &[(Provider::Vsin, "v-1")])).unwrap();
    let err = index
        .insert(identity("g-1", &[(Provider::Sbd, "s-1")]))
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateIdentity { .. }));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_index_rejects_conflicting_mapping_atomically() {
    let mut index = IdentityIndex::new();
    index.insert(identity("g-1", &[(Provider::Vsin, "v-1")])).unwrap();
    let err = index
        .insert(identity("g-2", &[(Provider::Sbd, "s-2"), (Provider::Vsin, "v-1")]))
        .unwrap_err();
    assert!(matches!(err, CoreError::IdentityConflict { .. }));
    assert!(index.resolve(Provider::Sbd, "s-2").is_none());
    assert_eq!(index.len(), 1);
}

#[test]
fn test_provider_labels() {
    for p in Provider::ALL {
        assert_eq!(Provider::parse(p.as_str()).unwrap(), p);
    }
    assert!(Provider::parse("pinnacle").is_err());
}
