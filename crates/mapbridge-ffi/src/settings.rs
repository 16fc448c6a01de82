// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide resource settings (base path, API key, log filter, fetch wait).
//!
//! Maps snapshot these when they are created; later changes only affect maps
//! created afterwards.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use mapbridge_app_core::config::{ConfigError, ConfigService, ConfigStore};
use mapbridge_app_core::prefs::{BridgePrefs, BRIDGE_PREFS_KEY};
use mapbridge_config_fs::FsConfigStore;
use mapbridge_engine::ResourceOptions;
use tracing::debug;

use crate::error::BridgeError;

static SETTINGS: RwLock<BridgePrefs> = RwLock::new(BridgePrefs {
    base_path: None,
    api_key: None,
    log_filter: None,
    fetch_timeout_ms: None,
});

fn update(f: impl FnOnce(&mut BridgePrefs)) {
    f(&mut SETTINGS.write().unwrap_or_else(|e| e.into_inner()));
}

pub(crate) fn snapshot() -> BridgePrefs {
    SETTINGS.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Sets the directory relative and `file://` URLs resolve against.
pub fn set_base_path(path: impl Into<PathBuf>) {
    let path = path.into();
    debug!(path = %path.display(), "base path set");
    update(|s| s.base_path = Some(path));
}

/// Sets the key substituted into `{key}` URL placeholders.
pub fn set_api_key(key: impl Into<String>) {
    let key = key.into();
    update(|s| s.api_key = Some(key));
    debug!("api key set");
}

/// Sets how long a render waits for an outstanding URL style fetch before
/// failing with `RenderFailed`.
pub fn set_fetch_timeout(timeout: Duration) {
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    update(|s| s.fetch_timeout_ms = Some(ms));
    debug!(ms, "fetch timeout set");
}

/// Overlays the fields set in `prefs` onto the process settings.
pub fn apply_prefs(prefs: BridgePrefs) {
    update(|s| s.merge(prefs));
}

/// Engine resource options reflecting the current settings.
pub fn resource_options() -> ResourceOptions {
    let settings = snapshot();
    let mut options = ResourceOptions::default();
    if let Some(path) = settings.base_path {
        options = options.with_base_path(path);
    }
    if let Some(key) = settings.api_key {
        options = options.with_api_key(key);
    }
    if let Some(ms) = settings.fetch_timeout_ms {
        options = options.with_fetch_timeout(Duration::from_millis(ms));
    }
    options
}

/// Loads the bridge settings document from `service` and applies it.
///
/// Returns `false` when no document is stored, leaving the settings unchanged.
pub fn load_settings_from<S: ConfigStore>(service: &ConfigService<S>) -> Result<bool, BridgeError> {
    let prefs = service
        .load::<BridgePrefs>(BRIDGE_PREFS_KEY)
        .map_err(config_error)?;
    match prefs {
        Some(prefs) => {
            apply_prefs(prefs);
            debug!("bridge settings loaded");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Loads `bridge.json` from `dir`, or from the platform config directory when `None`.
pub fn load_settings(dir: Option<&Path>) -> Result<bool, BridgeError> {
    let store = match dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .map_err(config_error)?;
    load_settings_from(&ConfigService::new(store))
}

fn config_error(err: ConfigError) -> BridgeError {
    match err {
        ConfigError::Serde(_) | ConfigError::InvalidKey(_) => {
            BridgeError::invalid(format!("settings: {err}"))
        }
        other => BridgeError::Unknown(format!("settings: {other}")),
    }
}
