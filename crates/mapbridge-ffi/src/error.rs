// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bridge errors, C error codes and the per-thread last-error slot.

use std::cell::RefCell;
use std::ffi::{c_char, CString};

use mapbridge_engine::EngineError;
use thiserror::Error;
use tracing::warn;

/// Closed set of result codes returned across the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// Null, malformed or out-of-range input.
    InvalidArgument = 1,
    /// The style document was rejected.
    StyleParse = 2,
    /// The engine failed while rendering, or produced an empty frame.
    RenderFailed = 3,
    /// Render requested before a style was loaded.
    NotLoaded = 4,
    /// A resource loader gave up.
    Timeout = 5,
    /// Anything else, including allocation failures and caught panics.
    Unknown = 99,
}

/// Error returned by every fallible bridge operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Input rejected before reaching the engine.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Style document rejected by the engine.
    #[error("style parse error: {0}")]
    StyleParse(String),
    /// Render requested before any style load was accepted.
    #[error("style not loaded")]
    NotLoaded,
    /// Engine failure during render, or an empty frame.
    #[error("render failed: {0}")]
    RenderFailed(String),
    /// A resource loader reported a timeout.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Any other failure.
    #[error("{0}")]
    Unknown(String),
}

impl BridgeError {
    /// C result code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::StyleParse(_) => ErrorCode::StyleParse,
            Self::NotLoaded => ErrorCode::NotLoaded,
            Self::RenderFailed(_) => ErrorCode::RenderFailed,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn not_initialized() -> Self {
        Self::invalid("library not initialized; call mb_init first")
    }

    /// Maps an engine failure during rendering.
    ///
    /// Only a loader-reported timeout becomes `Timeout`; a render that stops
    /// waiting on an outstanding fetch is `RenderFailed`.
    pub(crate) fn from_render(err: &EngineError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_allocation() {
            Self::Unknown(err.to_string())
        } else {
            Self::RenderFailed(err.to_string())
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Stores `msg` in the calling thread's last-error slot.
pub(crate) fn set_last_error(msg: &str) {
    let text = CString::new(msg.replace('\0', "\u{fffd}")).unwrap_or_default();
    // Ignored during thread-local teardown.
    let _ = LAST_ERROR.try_with(|slot| *slot.borrow_mut() = Some(text));
}

/// Records `err` for the caller and returns its code.
pub(crate) fn record(op: &'static str, err: &BridgeError) -> ErrorCode {
    warn!(op, code = ?err.code(), error = %err, "bridge call failed");
    set_last_error(&err.to_string());
    err.code()
}

/// Pointer to the calling thread's last error, or null if none was recorded.
///
/// The pointer stays valid until the next failing call on this thread.
pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR
        .try_with(|slot| {
            slot.borrow()
                .as_ref()
                .map_or(std::ptr::null(), |msg| msg.as_ptr())
        })
        .unwrap_or(std::ptr::null())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn slot_is_per_thread_and_sticky() {
        std::thread::spawn(|| {
            assert!(last_error_ptr().is_null());
            record("test", &BridgeError::NotLoaded);
            let msg = unsafe { CStr::from_ptr(last_error_ptr()) };
            assert_eq!(msg.to_str().unwrap(), "style not loaded");

            std::thread::spawn(|| assert!(last_error_ptr().is_null()))
                .join()
                .unwrap();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn interior_nul_is_replaced() {
        std::thread::spawn(|| {
            set_last_error("bad\0byte");
            let msg = unsafe { CStr::from_ptr(last_error_ptr()) };
            assert_eq!(msg.to_str().unwrap(), "bad\u{fffd}byte");
        })
        .join()
        .unwrap();
    }

    #[test]
    fn engine_timeouts_keep_their_code() {
        let timeout = BridgeError::from_render(&EngineError::Timeout("u".into()));
        assert_eq!(timeout.code(), ErrorCode::Timeout);
        let other = BridgeError::from_render(&EngineError::NotFound("u".into()));
        assert_eq!(other.code(), ErrorCode::RenderFailed);
    }

    #[test]
    fn outstanding_fetch_is_a_render_failure() {
        let err = BridgeError::from_render(&EngineError::FetchPending("u".into()));
        assert_eq!(err.code(), ErrorCode::RenderFailed);
    }

    #[test]
    fn raster_allocation_failure_is_unknown() {
        let err = BridgeError::from_render(&EngineError::Allocation {
            bytes: usize::MAX,
            width: 1,
            height: 1,
        });
        assert_eq!(err.code(), ErrorCode::Unknown);
    }
}
