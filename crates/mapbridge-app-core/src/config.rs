// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs, keyed by logical name.
///
/// Stores are shared with the bridge's process-wide settings, so they must be
/// usable from any thread.
pub trait ConfigStore: Send + Sync {
    /// Load the blob stored under `key`. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist `data` under `key`, replacing any previous blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The blob is not a valid document.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Keys become file names in some stores, so they are restricted.
    #[error("invalid config key `{0}`")]
    InvalidKey(String),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Checks that `key` is a non-empty run of `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    let ok = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey(key.to_owned()))
    }
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize the value under `key`. Missing or empty blobs
    /// yield `Ok(None)`.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        validate_key(key)?;
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        validate_key(key)?;
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::memory::InMemoryConfigStore;
    use crate::prefs::BridgePrefs;

    #[test]
    fn missing_and_empty_blobs_load_as_none() {
        let store = InMemoryConfigStore::new();
        store.save_raw("empty", b"").unwrap();
        let service = ConfigService::new(store);
        assert!(service.load::<BridgePrefs>("absent").unwrap().is_none());
        assert!(service.load::<BridgePrefs>("empty").unwrap().is_none());
    }

    #[test]
    fn malformed_blob_is_a_serde_error() {
        let store = InMemoryConfigStore::new();
        store.save_raw("bridge", b"{not json").unwrap();
        let err = ConfigService::new(store)
            .load::<BridgePrefs>("bridge")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Serde(_)));
    }

    #[test]
    fn keys_with_path_separators_are_rejected() {
        let service = ConfigService::new(InMemoryConfigStore::new());
        for key in ["", "../bridge", "a/b", "a.b"] {
            assert!(matches!(
                service.save(key, &BridgePrefs::default()),
                Err(ConfigError::InvalidKey(_))
            ));
        }
        assert_eq!(service.store().save_count(), 0);
    }
}
