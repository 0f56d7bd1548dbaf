use super::*;

#[test]
fn test_load_config_missing_file_returns_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does_not_exist.json");
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.cache.capacity, 50);
}

#[test]
fn test_load_config_minimal_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"guard": {"dailyLimit": 25}}"#).unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.guard.daily_limit, Some(25));
    assert_eq!(config.guard.failure_threshold, 3);
}

#[test]
fn test_load_config_invalid_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();
    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config JSON"));
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"cache": {"capacity": 0}}"#).unwrap();
    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("cache.capacity"));
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let mut config = Config::default();
    config.guard.daily_limit = Some(99);
    config.reminders.missed_grace_secs = 10;
    save_config(&config, Some(&path)).unwrap();

    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.guard.daily_limit, Some(99));
    assert_eq!(loaded.reminders.missed_grace_secs, 10);
}

#[test]
fn test_parse_daily_limit() {
    assert_eq!(parse_daily_limit("none"), Some(None));
    assert_eq!(parse_daily_limit(""), Some(None));
    assert_eq!(parse_daily_limit(" 40 "), Some(Some(40)));
    assert_eq!(parse_daily_limit("0"), None);
    assert_eq!(parse_daily_limit("lots"), None);
}

#[test]
fn test_get_db_path_prefers_configured_path() {
    let mut config = Config::default();
    config.storage.db_path = Some("/var/lib/concierge/state.db".into());
    assert_eq!(
        get_db_path(&config).unwrap(),
        PathBuf::from("/var/lib/concierge/state.db")
    );
}
