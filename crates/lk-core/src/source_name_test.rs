use super::*;

#[test]
fn test_source_name_trims_whitespace() {
    let name = SourceName::parse("  sbd ").unwrap();
    assert_eq!(name.as_str(), "sbd");
    assert_eq!(name, "sbd");
}

#[test]
fn test_source_name_rejects_blank() {
    assert!(SourceName::parse("").is_err());
    assert!(SourceName::parse("   ").is_err());
}

#[test]
fn test_source_name_from_str_and_display() {
    let name: SourceName = "vsin".parse().unwrap();
    assert_eq!(name.to_string(), "vsin");
    assert!(name.starts_with("vs"));
}

#[test]
fn test_source_name_deserialize_rejects_blank() {
    let ok: SourceName = serde_yaml::from_str("action_network").unwrap();
    assert_eq!(ok, "action_network");
    assert!(serde_yaml::from_str::<SourceName>("\"  \"").is_err());
}
