use questline_engine::constants::{MAX_LEVEL, MIN_LEVEL};
use questline_engine::{ConfigError, EngineConfig, MilestoneCatalog, StoreSnapshot};
use serde_json::Value;

#[test]
fn embedded_catalog_covers_every_level() {
    let catalog = MilestoneCatalog::standard();
    assert!(catalog.archetype_names().any(|name| name == "default"));
    for name in catalog.archetype_names() {
        let table = catalog.table_for(name);
        let mut previous = 0;
        for level in MIN_LEVEL..=MAX_LEVEL {
            let config = table
                .config(level)
                .unwrap_or_else(|| panic!("{name} is missing level {level}"));
            assert!(config.milestone_days > previous, "{name} level {level}");
            assert_eq!(config.milestone_days, 2 * level + 1, "{name} level {level}");
            assert!(config.will_gain >= 0.0);
            previous = config.milestone_days;
        }
    }
}

#[test]
fn catalog_round_trips_through_json() {
    let catalog = MilestoneCatalog::standard();
    let json = serde_json::to_string(catalog).unwrap();
    let parsed = MilestoneCatalog::from_json(&json).unwrap();
    assert_eq!(&parsed, catalog);
}

#[test]
fn catalog_rejects_unknown_default_archetype() {
    let json = r#"{ "default_archetype": "ghost", "archetypes": {} }"#;
    assert!(matches!(
        MilestoneCatalog::from_json(json),
        Err(ConfigError::UnknownDefaultArchetype(name)) if name == "ghost"
    ));
}

#[test]
fn engine_config_reports_bad_fields() {
    let err = EngineConfig::from_json(r#"{ "max_level": 12 }"#).unwrap_err();
    assert!(err.to_string().contains("12"));
    assert!(matches!(
        EngineConfig::from_json(r#"{ "record_retention": 0 }"#),
        Err(ConfigError::MinViolation {
            field: "record_retention",
            ..
        })
    ));
    assert!(matches!(
        EngineConfig::from_json("not json"),
        Err(ConfigError::Parse(_))
    ));
    let partial = EngineConfig::from_json(r#"{ "tolerate_write_failure": true }"#).unwrap();
    assert!(partial.tolerate_write_failure);
    assert_eq!(partial.max_level, MAX_LEVEL);
}

#[test]
fn empty_snapshot_shape_is_stable() {
    let value = serde_json::to_value(StoreSnapshot::default()).unwrap();
    let Value::Object(map) = value else {
        panic!("snapshot serializes as an object");
    };
    let keys: Vec<_> = map.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["paths", "profiles", "progress", "quests", "records"]);
    let restored: StoreSnapshot = serde_json::from_str("{}").unwrap();
    assert_eq!(restored, StoreSnapshot::default());
}
