// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted bridge settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Config key the bridge settings are stored under.
pub const BRIDGE_PREFS_KEY: &str = "bridge";

/// Settings a host can persist instead of calling the setters at startup.
///
/// Every field is optional; an absent field leaves the corresponding process
/// setting untouched when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgePrefs {
    /// Directory that relative and `file://` resource URLs resolve against.
    pub base_path: Option<PathBuf>,
    /// Key substituted into `{key}` URL placeholders.
    pub api_key: Option<String>,
    /// `tracing` filter directive used when logging is initialized without one.
    pub log_filter: Option<String>,
    /// Longest a render waits for an outstanding URL style fetch, in milliseconds.
    pub fetch_timeout_ms: Option<u64>,
}

impl BridgePrefs {
    /// Overlays the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: Self) {
        if other.base_path.is_some() {
            self.base_path = other.base_path;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.log_filter.is_some() {
            self.log_filter = other.log_filter;
        }
        if other.fetch_timeout_ms.is_some() {
            self.fetch_timeout_ms = other.fetch_timeout_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn unknown_and_missing_fields_are_tolerated() {
        let prefs: BridgePrefs =
            serde_json::from_str(r#"{"api_key":"k","theme":"dark"}"#).unwrap();
        assert_eq!(prefs.api_key.as_deref(), Some("k"));
        assert_eq!(prefs.base_path, None);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut prefs = BridgePrefs {
            base_path: Some("/maps".into()),
            api_key: Some("old".into()),
            log_filter: None,
            fetch_timeout_ms: Some(500),
        };
        prefs.merge(BridgePrefs {
            api_key: Some("new".into()),
            ..BridgePrefs::default()
        });
        assert_eq!(prefs.base_path, Some(PathBuf::from("/maps")));
        assert_eq!(prefs.api_key.as_deref(), Some("new"));
        assert_eq!(prefs.fetch_timeout_ms, Some(500));
    }
}
