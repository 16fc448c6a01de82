// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `extern "C"` entry points.
//!
//! Every function catches panics and records failures in the calling thread's
//! last-error slot (read back with [`mb_get_last_error`]). Success never clears
//! the slot.

use std::any::Any;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use mapbridge_engine::Size;

use crate::buffer::free_raw;
use crate::context;
use crate::error::{last_error_ptr, record, BridgeError, ErrorCode};
use crate::loader::CallbackFileSource;
use crate::logging::init_logging;
use crate::map::{map_mode_from_raw, CameraPose, DebugFlags, MapState};
use crate::render::{render_still, RenderOptions};
use crate::settings;
use crate::target::RenderTarget;
use crate::types::{
    mb_camera_options, mb_error_code, mb_image_data, mb_render_callback, mb_render_options,
    mb_resource_callback, mb_size,
};

/// Opaque render target handle.
pub struct MbRenderTarget {
    inner: RenderTarget,
}

/// Opaque map handle. Borrows its render target without owning it.
pub struct MbMap {
    inner: MapState,
    target: NonNull<MbRenderTarget>,
}

fn panic_error(op: &'static str, payload: &(dyn Any + Send)) -> BridgeError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into());
    BridgeError::Unknown(format!("panic in {op}: {detail}"))
}

/// Runs `f`, returning `fallback` after recording any error or panic.
fn guard<T>(op: &'static str, fallback: T, f: impl FnOnce() -> Result<T, BridgeError>) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            record(op, &err);
            fallback
        }
        Err(payload) => {
            record(op, &panic_error(op, payload.as_ref()));
            fallback
        }
    }
}

/// Like [`guard`] for calls that report only a result code.
fn guard_code(op: &'static str, f: impl FnOnce() -> Result<(), BridgeError>) -> mb_error_code {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorCode::Ok,
        Ok(Err(err)) => record(op, &err),
        Err(payload) => record(op, &panic_error(op, payload.as_ref())),
    }
}

unsafe fn c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, BridgeError> {
    if ptr.is_null() {
        return Err(BridgeError::invalid(format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| BridgeError::invalid(format!("{what} is not valid UTF-8")))
}

unsafe fn target_mut<'a>(target: *mut MbRenderTarget) -> Result<&'a mut MbRenderTarget, BridgeError> {
    unsafe { target.as_mut() }.ok_or_else(|| BridgeError::invalid("render target handle is null"))
}

unsafe fn map_mut<'a>(map: *mut MbMap) -> Result<&'a mut MbMap, BridgeError> {
    unsafe { map.as_mut() }.ok_or_else(|| BridgeError::invalid("map handle is null"))
}

fn into_handle<T>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}

// ── Execution context ───────────────────────────────────────────────

/// Initializes the library and attaches a run loop to the calling thread.
/// Safe to call repeatedly and from several threads.
#[no_mangle]
pub extern "C" fn mb_init() -> mb_error_code {
    guard_code("mb_init", context::initialize)
}

/// Clears the initialized flag. Existing handles stay valid.
#[no_mangle]
pub extern "C" fn mb_cleanup() {
    guard("mb_cleanup", (), || {
        context::cleanup();
        Ok(())
    });
}

// ── Render targets ──────────────────────────────────────────────────

/// Creates a render target, or returns null on failure.
#[no_mangle]
pub extern "C" fn mb_render_target_create(size: mb_size, pixel_ratio: f32) -> *mut MbRenderTarget {
    guard("mb_render_target_create", std::ptr::null_mut(), || {
        let inner = RenderTarget::new(size.into(), pixel_ratio)?;
        Ok(into_handle(MbRenderTarget { inner }))
    })
}

/// Releases a render target. Null is ignored.
///
/// # Safety
/// `target` must be null or a live handle from [`mb_render_target_create`]
/// that no live map still uses. The handle is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn mb_render_target_destroy(target: *mut MbRenderTarget) {
    if target.is_null() {
        return;
    }
    guard("mb_render_target_destroy", (), || {
        drop(unsafe { Box::from_raw(target) });
        Ok(())
    });
}

/// Resizes a render target. Null handles and zero extents are ignored.
///
/// # Safety
/// `target` must be null or a live render target handle.
#[no_mangle]
pub unsafe extern "C" fn mb_render_target_set_size(target: *mut MbRenderTarget, size: mb_size) {
    if target.is_null() {
        return;
    }
    guard("mb_render_target_set_size", (), || {
        unsafe { target_mut(target) }?.inner.set_size(size.into())
    });
}

/// Current size of a render target; 0x0 for null.
///
/// # Safety
/// `target` must be null or a live render target handle.
#[no_mangle]
pub unsafe extern "C" fn mb_render_target_get_size(target: *mut MbRenderTarget) -> mb_size {
    match unsafe { target.as_ref() } {
        Some(target) => target.inner.size().into(),
        None => mb_size::default(),
    }
}

// ── Maps ────────────────────────────────────────────────────────────

unsafe fn create_map(
    target: *mut MbRenderTarget,
    pixel_ratio: f32,
    mode: u32,
    loader: Option<CallbackFileSource>,
) -> Result<*mut MbMap, BridgeError> {
    let target_ptr = NonNull::new(target)
        .ok_or_else(|| BridgeError::invalid("render target handle is null"))?;
    let target_ref = unsafe { target_ptr.as_ref() };
    let file_source = loader.map(|source| Arc::new(source) as Arc<dyn mapbridge_engine::FileSource>);
    let inner = MapState::with_file_source(
        &target_ref.inner,
        pixel_ratio,
        map_mode_from_raw(mode),
        file_source,
    )?;
    Ok(into_handle(MbMap {
        inner,
        target: target_ptr,
    }))
}

/// Creates a map rendering into `target`, or returns null on failure.
/// `mode` is `MB_MAP_MODE_TILE` for tiles; any other value means static.
///
/// # Safety
/// `target` must be null or a live render target handle that outlives the map.
#[no_mangle]
pub unsafe extern "C" fn mb_map_create(
    target: *mut MbRenderTarget,
    pixel_ratio: f32,
    mode: u32,
) -> *mut MbMap {
    guard("mb_map_create", std::ptr::null_mut(), || unsafe {
        create_map(target, pixel_ratio, mode, None)
    })
}

/// Like [`mb_map_create`], routing every resource request through `callback`.
/// A null callback selects the built-in local file source.
///
/// # Safety
/// `target` as for [`mb_map_create`]. `callback` may run on engine worker
/// threads; it and `user_data` must stay valid and thread-safe until the map
/// is destroyed and any style fetch it started has finished.
#[no_mangle]
pub unsafe extern "C" fn mb_map_create_with_loader(
    target: *mut MbRenderTarget,
    pixel_ratio: f32,
    mode: u32,
    callback: mb_resource_callback,
    user_data: *mut c_void,
) -> *mut MbMap {
    guard("mb_map_create_with_loader", std::ptr::null_mut(), || unsafe {
        let loader = callback.map(|cb| CallbackFileSource::new(cb, user_data));
        create_map(target, pixel_ratio, mode, loader)
    })
}

/// Releases a map. Its render target is left alone. Null is ignored.
///
/// # Safety
/// `map` must be null or a live map handle. The handle is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn mb_map_destroy(map: *mut MbMap) {
    if map.is_null() {
        return;
    }
    guard("mb_map_destroy", (), || {
        drop(unsafe { Box::from_raw(map) });
        Ok(())
    });
}

/// Parses `style_json` as the map's style.
///
/// # Safety
/// `map` must be null or a live map handle; `style_json` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_map_load_style(map: *mut MbMap, style_json: *const c_char) -> mb_error_code {
    guard_code("mb_map_load_style", || {
        let map = unsafe { map_mut(map) }?;
        let json = unsafe { c_str(style_json, "style JSON") }?;
        map.inner.load_style(json)
    })
}

/// Starts loading the style at `url` and returns without waiting for it.
///
/// # Safety
/// `map` must be null or a live map handle; `url` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_map_load_style_url(map: *mut MbMap, url: *const c_char) -> mb_error_code {
    guard_code("mb_map_load_style_url", || {
        let map = unsafe { map_mut(map) }?;
        let url = unsafe { c_str(url, "style URL") }?;
        map.inner.load_style_url(url)
    })
}

/// Whether the engine reports the style and its resources loaded. False for null.
///
/// # Safety
/// `map` must be null or a live map handle.
#[no_mangle]
pub unsafe extern "C" fn mb_map_is_fully_loaded(map: *mut MbMap) -> bool {
    guard("mb_map_is_fully_loaded", false, || {
        Ok(unsafe { map.as_mut() }.is_some_and(|map| map.inner.is_fully_loaded()))
    })
}

/// Moves the camera. Null arguments are ignored.
///
/// # Safety
/// `map` must be null or a live map handle; `camera` null or valid to read.
#[no_mangle]
pub unsafe extern "C" fn mb_map_set_camera(map: *mut MbMap, camera: *const mb_camera_options) {
    let (Some(map), Some(camera)) = (unsafe { map.as_mut() }, unsafe { camera.as_ref() }) else {
        return;
    };
    guard("mb_map_set_camera", (), || {
        map.inner.set_camera(CameraPose::from(*camera))
    });
}

/// Current camera; unset fields and null handles read as zeros.
///
/// # Safety
/// `map` must be null or a live map handle.
#[no_mangle]
pub unsafe extern "C" fn mb_map_get_camera(map: *mut MbMap) -> mb_camera_options {
    match unsafe { map.as_ref() } {
        Some(map) => map.inner.camera().into(),
        None => mb_camera_options::default(),
    }
}

/// Resizes the map's render target, then the map. Null handles and zero
/// extents are ignored.
///
/// # Safety
/// `map` must be null or a live map handle whose target is still alive.
#[no_mangle]
pub unsafe extern "C" fn mb_map_set_size(map: *mut MbMap, size: mb_size) {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return;
    };
    guard("mb_map_set_size", (), || {
        let target = unsafe { &mut (*map.target.as_ptr()).inner };
        map.inner.set_size(target, size.into())
    });
}

/// Replaces the debug flags (`MB_DEBUG_*` bits; unknown bits are ignored).
///
/// # Safety
/// `map` must be null or a live map handle.
#[no_mangle]
pub unsafe extern "C" fn mb_map_set_debug(map: *mut MbMap, flags: u32) {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return;
    };
    guard("mb_map_set_debug", (), || {
        map.inner.set_debug(DebugFlags::from_bits(flags))
    });
}

unsafe fn render_into(
    map: *mut MbMap,
    options: *const mb_render_options,
    out: *mut mb_image_data,
) -> Result<(), BridgeError> {
    if let Some(record) = unsafe { out.as_mut() } {
        *record = mb_image_data::empty();
    }
    let map = unsafe { map_mut(map) }?;
    let out = unsafe { out.as_mut() }.ok_or_else(|| BridgeError::invalid("output image is null"))?;
    let target = unsafe { &mut (*map.target.as_ptr()).inner };
    let options = unsafe { options.as_ref() }.map(RenderOptions::from);
    let buffer = render_still(&mut map.inner, target, options.as_ref())?;
    *out = buffer.into_raw();
    Ok(())
}

/// Renders one still frame into `out`, which must be released with
/// [`mb_image_free`] on success. On failure `out` is left zeroed.
///
/// `options` may be null; when given, its size (if both extents are
/// positive), camera and debug flags are applied and persist.
///
/// # Safety
/// `map` must be null or a live map handle whose target is still alive;
/// `options` null or valid to read; `out` null or valid to write.
#[no_mangle]
pub unsafe extern "C" fn mb_map_render_still(
    map: *mut MbMap,
    options: *const mb_render_options,
    out: *mut mb_image_data,
) -> mb_error_code {
    guard_code("mb_map_render_still", || unsafe { render_into(map, options, out) })
}

/// Synchronous render reported through `callback`, which runs exactly once on
/// the calling thread before this function returns. A null callback makes the
/// call a no-op.
///
/// On success the callback receives a pointer to a filled image record that is
/// only valid during the callback; copy the record and release the copy with
/// [`mb_image_free`]. On failure the image pointer is null.
///
/// # Safety
/// As for [`mb_map_render_still`]; `callback` must be safe to call with `user_data`.
#[no_mangle]
pub unsafe extern "C" fn mb_map_render_still_async(
    map: *mut MbMap,
    options: *const mb_render_options,
    callback: mb_render_callback,
    user_data: *mut c_void,
) {
    let Some(callback) = callback else {
        return;
    };
    let mut image = mb_image_data::empty();
    let code = guard_code("mb_map_render_still_async", || unsafe {
        render_into(map, options, &mut image)
    });
    let image_ptr: *mut mb_image_data = if code == ErrorCode::Ok {
        &mut image
    } else {
        std::ptr::null_mut()
    };
    unsafe { callback(code, image_ptr, user_data) };
}

/// Releases the pixels of a rendered image and zeroes the record. Null and
/// already-released records are ignored.
///
/// # Safety
/// `image` must be null or point to a record filled by a successful render
/// (or zeroed by a previous release).
#[no_mangle]
pub unsafe extern "C" fn mb_image_free(image: *mut mb_image_data) {
    let Some(image) = (unsafe { image.as_mut() }) else {
        return;
    };
    guard("mb_image_free", (), || {
        unsafe { free_raw(image) };
        Ok(())
    });
}

/// Last error recorded on the calling thread, or null if none.
///
/// The string is owned by the bridge and valid until the next failing call on
/// this thread.
#[no_mangle]
pub extern "C" fn mb_get_last_error() -> *const c_char {
    last_error_ptr()
}

// ── Style images ────────────────────────────────────────────────────

/// Registers a straight-alpha RGBA image of `width * height * 4` bytes under
/// `id`, replacing any image with the same id.
///
/// # Safety
/// `map` must be null or a live map handle; `id` null or NUL-terminated;
/// `data` null or valid for `width * height * 4` bytes.
#[no_mangle]
pub unsafe extern "C" fn mb_map_add_image(
    map: *mut MbMap,
    id: *const c_char,
    data: *const u8,
    width: u32,
    height: u32,
    pixel_ratio: f32,
    sdf: bool,
) -> mb_error_code {
    guard_code("mb_map_add_image", || {
        let map = unsafe { map_mut(map) }?;
        let id = unsafe { c_str(id, "image id") }?;
        if data.is_null() {
            return Err(BridgeError::invalid("image data is null"));
        }
        let len = Size::new(width, height)
            .rgba_len()
            .ok_or_else(|| BridgeError::invalid(format!("image {width}x{height} is too large")))?;
        let pixels = unsafe { std::slice::from_raw_parts(data, len) };
        map.inner.add_image(id, pixels, width, height, pixel_ratio, sdf)
    })
}

/// Removes the image registered under `id`; missing ids are not an error.
///
/// # Safety
/// `map` must be null or a live map handle; `id` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_map_remove_image(map: *mut MbMap, id: *const c_char) -> mb_error_code {
    guard_code("mb_map_remove_image", || {
        let map = unsafe { map_mut(map) }?;
        let id = unsafe { c_str(id, "image id") }?;
        map.inner.remove_image(id)
    })
}

// ── Process settings ────────────────────────────────────────────────

/// Sets the directory local resource URLs resolve against, for maps created
/// afterwards. Null is ignored.
///
/// # Safety
/// `path` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_set_base_path(path: *const c_char) {
    if path.is_null() {
        return;
    }
    guard("mb_set_base_path", (), || {
        settings::set_base_path(unsafe { c_str(path, "base path") }?);
        Ok(())
    });
}

/// Sets the key substituted into `{key}` URL placeholders, for maps created
/// afterwards. Null is ignored.
///
/// # Safety
/// `key` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_set_api_key(key: *const c_char) {
    if key.is_null() {
        return;
    }
    guard("mb_set_api_key", (), || {
        settings::set_api_key(unsafe { c_str(key, "API key") }?);
        Ok(())
    });
}

/// Installs a stderr log subscriber with `filter` (`tracing` directive
/// syntax). Null uses the persisted setting, then `RUST_LOG`, then `info`.
///
/// # Safety
/// `filter` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_init_logging(filter: *const c_char) -> mb_error_code {
    guard_code("mb_init_logging", || {
        let filter = if filter.is_null() {
            None
        } else {
            Some(unsafe { c_str(filter, "log filter") }?)
        };
        init_logging(filter)
    })
}

/// Applies `bridge.json` from `dir`, or from the platform config directory
/// when null. A missing file is not an error.
///
/// # Safety
/// `dir` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_load_settings(dir: *const c_char) -> mb_error_code {
    guard_code("mb_load_settings", || {
        let dir = if dir.is_null() {
            None
        } else {
            Some(Path::new(unsafe { c_str(dir, "settings directory") }?))
        };
        settings::load_settings(dir).map(|_| ())
    })
}
