// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory [`ConfigStore`] for hosts that keep settings themselves, and for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{ConfigError, ConfigStore};

/// Cloneable in-memory store; clones share the same contents.
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `load_raw` fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail_on_load = fail;
    }

    /// Number of `load_raw` calls, including failed ones.
    pub fn load_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).load_count
    }

    /// Number of `save_raw` calls.
    pub fn save_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).save_count
    }

    /// Whether `key` holds a blob.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .contains_key(key)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.save_count += 1;
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::ConfigService;
    use crate::prefs::{BridgePrefs, BRIDGE_PREFS_KEY};

    #[test]
    fn prefs_round_trip_through_shared_clone() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());
        let prefs = BridgePrefs {
            api_key: Some("secret".into()),
            ..BridgePrefs::default()
        };
        service.save(BRIDGE_PREFS_KEY, &prefs).unwrap();
        assert!(store.contains_key(BRIDGE_PREFS_KEY));
        assert_eq!(service.load::<BridgePrefs>(BRIDGE_PREFS_KEY).unwrap(), Some(prefs));
        assert_eq!((store.save_count(), store.load_count()), (1, 1));
    }

    #[test]
    fn load_failure_is_reported() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        let err = ConfigService::new(store)
            .load::<BridgePrefs>(BRIDGE_PREFS_KEY)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Other(_)));
    }
}
