// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resource fetching: request descriptions, the file source port, and the
//! local-file default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::{EngineError, LOG_TARGET};

/// What a requested resource will be used for.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Unclassified.
    Unknown = 0,
    /// Style document.
    Style = 1,
    /// Source (TileJSON) document.
    Source = 2,
    /// Tile payload.
    Tile = 3,
    /// Glyph range.
    Glyphs = 4,
    /// Sprite sheet image.
    SpriteImage = 5,
    /// Sprite sheet index.
    SpriteJson = 6,
}

impl ResourceKind {
    /// Wire value used by hosts.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Intended use.
    pub kind: ResourceKind,
    /// Fully resolved URL.
    pub url: String,
}

impl Resource {
    /// A style document request.
    pub fn style(url: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Style,
            url: url.into(),
        }
    }
}

/// Port through which the engine fetches every external resource.
///
/// Requests run on engine worker threads, so implementations must be
/// thread-safe.
pub trait FileSource: Send + Sync {
    /// Fetches `resource`, returning its bytes.
    fn request(&self, resource: &Resource) -> Result<Vec<u8>, EngineError>;
}

/// Resource settings a map is created with.
#[derive(Clone, Default)]
pub struct ResourceOptions {
    /// Directory that relative and `file://` URLs resolve against.
    pub base_path: Option<PathBuf>,
    /// Substituted for `{key}` placeholders in requested URLs.
    pub api_key: Option<String>,
    /// Custom file source; `None` selects [`LocalFileSource`].
    pub file_source: Option<Arc<dyn FileSource>>,
    /// Longest a render waits for an outstanding style fetch.
    pub fetch_timeout: Option<Duration>,
}

impl ResourceOptions {
    /// Default wait applied when `fetch_timeout` is unset.
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    /// Sets the base path.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Installs a custom file source.
    pub fn with_file_source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.file_source = Some(source);
        self
    }

    /// Sets the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Applies URL templating (API key substitution).
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.api_key {
            Some(key) if url.contains("{key}") => url.replace("{key}", key),
            _ => url.to_owned(),
        }
    }

    /// The file source requests go through.
    pub fn file_source(&self) -> Arc<dyn FileSource> {
        self.file_source.clone().unwrap_or_else(|| {
            Arc::new(LocalFileSource::new(self.base_path.clone())) as Arc<dyn FileSource>
        })
    }

    /// Effective fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout.unwrap_or(Self::DEFAULT_FETCH_TIMEOUT)
    }
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("base_path", &self.base_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("file_source", &self.file_source.as_ref().map(|_| "<custom>"))
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

/// Serves `file://` URLs and bare paths from the local filesystem.
///
/// Network schemes are refused; hosts that need them install their own
/// [`FileSource`].
#[derive(Debug, Clone, Default)]
pub struct LocalFileSource {
    base_path: Option<PathBuf>,
}

impl LocalFileSource {
    /// Creates a source resolving relative paths against `base_path`.
    pub fn new(base_path: Option<PathBuf>) -> Self {
        Self { base_path }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let raw = match url.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return None,
            None => url,
        };
        let path = Path::new(raw);
        Some(match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl FileSource for LocalFileSource {
    fn request(&self, resource: &Resource) -> Result<Vec<u8>, EngineError> {
        let path = self
            .local_path(&resource.url)
            .ok_or_else(|| EngineError::Resource {
                url: resource.url.clone(),
                message: "no file source installed for this scheme".into(),
            })?;
        debug!(target: LOG_TARGET, url = %resource.url, path = %path.display(), "local fetch");
        std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => EngineError::NotFound(resource.url.clone()),
            std::io::ErrorKind::TimedOut => EngineError::Timeout(resource.url.clone()),
            _ => EngineError::Resource {
                url: resource.url.clone(),
                message: err.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn api_key_placeholder_is_substituted() {
        let options = ResourceOptions::default().with_api_key("abc");
        assert_eq!(
            options.resolve_url("https://tiles.example/style.json?key={key}"),
            "https://tiles.example/style.json?key=abc"
        );
        assert_eq!(options.resolve_url("file://a.json"), "file://a.json");
    }

    #[test]
    fn local_source_resolves_relative_paths_against_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.json"), b"{}").unwrap();
        let source = LocalFileSource::new(Some(dir.path().to_path_buf()));

        assert_eq!(source.request(&Resource::style("style.json")).unwrap(), b"{}");
        assert_eq!(
            source.request(&Resource::style("file://style.json")).unwrap(),
            b"{}"
        );
        assert_eq!(
            source.request(&Resource::style("missing.json")),
            Err(EngineError::NotFound("missing.json".into()))
        );
    }

    #[test]
    fn local_source_refuses_network_schemes() {
        let err = LocalFileSource::default()
            .request(&Resource::style("https://example.com/style.json"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Resource { .. }));
    }
}
