// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host resource loader callbacks plugged into the engine's file source.

use std::ffi::{c_void, CStr, CString};

use mapbridge_engine::{EngineError, FileSource, Resource};
use tracing::debug;

use crate::types::{mb_resource_request, mb_resource_response};

type RawCallback =
    unsafe extern "C" fn(*const mb_resource_request, *mut mb_resource_response, *mut c_void);

/// What a loader callback reported, copied out of the C response record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceResponse {
    /// Body bytes.
    Data(Vec<u8>),
    /// The resource does not exist.
    NotFound,
    /// The fetch timed out.
    TimedOut,
    /// Any other failure, with the loader's message.
    Error(String),
}

impl ResourceResponse {
    /// Copies a response record. Flags win over `error`, which wins over data.
    ///
    /// # Safety
    /// `error` must be null or NUL-terminated, and `data` must be null or
    /// valid for `data_len` bytes.
    pub unsafe fn from_raw(raw: &mb_resource_response) -> Self {
        if raw.timed_out {
            return Self::TimedOut;
        }
        if raw.not_found {
            return Self::NotFound;
        }
        if !raw.error.is_null() {
            let msg = unsafe { CStr::from_ptr(raw.error) };
            return Self::Error(msg.to_string_lossy().into_owned());
        }
        if raw.data.is_null() || raw.data_len == 0 {
            return Self::Data(Vec::new());
        }
        Self::Data(unsafe { std::slice::from_raw_parts(raw.data, raw.data_len) }.to_vec())
    }

    fn into_result(self, url: &str) -> Result<Vec<u8>, EngineError> {
        match self {
            Self::Data(bytes) => Ok(bytes),
            Self::NotFound => Err(EngineError::NotFound(url.to_owned())),
            Self::TimedOut => Err(EngineError::Timeout(url.to_owned())),
            Self::Error(message) => Err(EngineError::Resource {
                url: url.to_owned(),
                message,
            }),
        }
    }
}

struct UserData(*mut c_void);

// The host promises its user data may be used from engine worker threads.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// [`FileSource`] that forwards every request to a host C callback.
pub struct CallbackFileSource {
    callback: RawCallback,
    user_data: UserData,
}

impl CallbackFileSource {
    /// Wraps a host callback.
    ///
    /// # Safety
    /// `callback` must be safe to call from any thread with `user_data` for as
    /// long as any map using this source is alive, and must fill the response
    /// as documented on [`mb_resource_response`].
    pub unsafe fn new(callback: RawCallback, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data: UserData(user_data),
        }
    }
}

impl FileSource for CallbackFileSource {
    fn request(&self, resource: &Resource) -> Result<Vec<u8>, EngineError> {
        let url = CString::new(resource.url.as_str()).map_err(|_| EngineError::Resource {
            url: resource.url.clone(),
            message: "URL contains a NUL byte".into(),
        })?;
        let request = mb_resource_request {
            url: url.as_ptr(),
            kind: resource.kind.as_u8(),
        };
        let mut response = mb_resource_response::default();
        debug!(url = %resource.url, kind = ?resource.kind, "host loader request");
        let copied = unsafe {
            (self.callback)(&request, &mut response, self.user_data.0);
            ResourceResponse::from_raw(&response)
        };
        copied.into_result(&resource.url)
    }
}

impl std::fmt::Debug for CallbackFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackFileSource").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BODY: &[u8] = b"{\"version\":8,\"layers\":[]}";
    static ERR: &CStr = c"upstream 500";

    unsafe extern "C" fn serve(
        request: *const mb_resource_request,
        response: *mut mb_resource_response,
        user_data: *mut c_void,
    ) {
        let calls = unsafe { &*user_data.cast::<AtomicUsize>() };
        calls.fetch_add(1, Ordering::SeqCst);
        let request = unsafe { &*request };
        let response = unsafe { &mut *response };
        let url = unsafe { CStr::from_ptr(request.url) }.to_str().unwrap();
        match url {
            "ok" => {
                response.data = BODY.as_ptr();
                response.data_len = BODY.len();
            }
            "missing" => response.not_found = true,
            "slow" => response.timed_out = true,
            _ => response.error = ERR.as_ptr(),
        }
    }

    #[test]
    fn responses_map_onto_engine_results() {
        let calls = Box::leak(Box::new(AtomicUsize::new(0)));
        let source =
            unsafe { CallbackFileSource::new(serve, std::ptr::from_mut(calls).cast()) };

        assert_eq!(source.request(&Resource::style("ok")).unwrap(), BODY);
        assert_eq!(
            source.request(&Resource::style("missing")),
            Err(EngineError::NotFound("missing".into()))
        );
        assert!(source.request(&Resource::style("slow")).unwrap_err().is_timeout());
        assert_eq!(
            source.request(&Resource::style("boom")),
            Err(EngineError::Resource {
                url: "boom".into(),
                message: "upstream 500".into()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
