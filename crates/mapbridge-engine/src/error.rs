// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine error type.

use thiserror::Error;

/// Errors emitted by the engine.
///
/// The type is `Clone` because a failed background fetch is remembered by the
/// map and reported again on every render until a new style is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An engine object was touched on a thread that has no run loop.
    #[error("no run loop on the current thread")]
    NoRunLoop,
    /// A second run loop was requested on a thread that already has one.
    #[error("a run loop already exists on the current thread")]
    RunLoopExists,
    /// The style document could not be parsed or failed validation.
    #[error("{0}")]
    StyleParse(String),
    /// Rendering was requested before a style finished loading.
    #[error("style is not loaded")]
    StyleNotLoaded,
    /// An image was rejected by the style image registry.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// The file source reported a failure for `url`.
    #[error("failed to fetch {url}: {message}")]
    Resource {
        /// Requested URL.
        url: String,
        /// Failure reported by the file source.
        message: String,
    },
    /// The file source reported that `url` does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The file source gave up on `url`.
    #[error("timed out fetching {0}")]
    Timeout(String),
    /// A render stopped waiting for the style fetch of `url`, which is still
    /// outstanding.
    #[error("style fetch for {0} is still outstanding")]
    FetchPending(String),
    /// A raster buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes for a {width}x{height} raster")]
    Allocation {
        /// Requested byte length.
        bytes: usize,
        /// Raster width.
        width: u32,
        /// Raster height.
        height: u32,
    },
    /// A background worker could not be started.
    #[error("failed to start worker: {0}")]
    Worker(String),
}

impl EngineError {
    /// True when a file source reported a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True when a raster allocation failed.
    pub fn is_allocation(&self) -> bool {
        matches!(self, Self::Allocation { .. })
    }
}
