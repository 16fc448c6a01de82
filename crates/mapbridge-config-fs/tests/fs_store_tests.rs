// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
use mapbridge_app_core::config::{ConfigError, ConfigService, ConfigStore};
use mapbridge_app_core::prefs::{BridgePrefs, BRIDGE_PREFS_KEY};
use mapbridge_config_fs::FsConfigStore;

#[test]
fn prefs_persist_as_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsConfigStore::at(dir.path().join("nested")).unwrap();
    let service = ConfigService::new(store);
    let prefs = BridgePrefs {
        base_path: Some("/srv/maps".into()),
        api_key: Some("abc".into()),
        log_filter: Some("debug".into()),
        fetch_timeout_ms: None,
    };
    service.save(BRIDGE_PREFS_KEY, &prefs).unwrap();

    let file = dir.path().join("nested").join("bridge.json");
    let text = std::fs::read_to_string(file).unwrap();
    assert!(text.contains("\"api_key\": \"abc\""));
    assert_eq!(service.load::<BridgePrefs>(BRIDGE_PREFS_KEY).unwrap(), Some(prefs));
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsConfigStore::at(dir.path()).unwrap();
    assert!(matches!(store.load_raw("bridge"), Err(ConfigError::NotFound)));
}

#[test]
fn traversal_keys_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsConfigStore::at(dir.path()).unwrap();
    assert!(matches!(
        store.save_raw("../escape", b"{}"),
        Err(ConfigError::InvalidKey(_))
    ));
}
