// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `#[repr(C)]` records shared with C callers. Layouts match `include/mapbridge.h`.

use std::ffi::{c_char, c_void};

use mapbridge_engine::Size;

use crate::error::ErrorCode;
use crate::map::{map_mode_from_raw, CameraPose, DebugFlags};
use crate::render::RenderOptions;

/// Result code returned by every fallible `mb_*` function.
pub type mb_error_code = ErrorCode;

/// `mb_map_mode` value for still images.
pub const MB_MAP_MODE_STATIC: u32 = 0;
/// `mb_map_mode` value for single tiles.
pub const MB_MAP_MODE_TILE: u32 = 1;

/// No debug overlays.
pub const MB_DEBUG_NONE: u32 = 0;
/// Outline tiles.
pub const MB_DEBUG_TILE_BORDERS: u32 = DebugFlags::TILE_BORDERS;
/// Tile parse state.
pub const MB_DEBUG_PARSE_STATUS: u32 = DebugFlags::PARSE_STATUS;
/// Tile load timestamps.
pub const MB_DEBUG_TIMESTAMPS: u32 = DebugFlags::TIMESTAMPS;
/// Collision boxes.
pub const MB_DEBUG_COLLISION: u32 = DebugFlags::COLLISION;
/// Overdraw visualization.
pub const MB_DEBUG_OVERDRAW: u32 = DebugFlags::OVERDRAW;

/// Width and height.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct mb_size {
    /// Horizontal extent.
    pub width: u32,
    /// Vertical extent.
    pub height: u32,
}

impl From<mb_size> for Size {
    fn from(size: mb_size) -> Self {
        Self::new(size.width, size.height)
    }
}

impl From<Size> for mb_size {
    fn from(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

/// Camera placement.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct mb_camera_options {
    /// Center latitude in degrees.
    pub latitude: f64,
    /// Center longitude in degrees.
    pub longitude: f64,
    /// Zoom level.
    pub zoom: f64,
    /// Bearing in degrees.
    pub bearing: f64,
    /// Pitch in degrees.
    pub pitch: f64,
}

impl From<mb_camera_options> for CameraPose {
    fn from(c: mb_camera_options) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
            zoom: c.zoom,
            bearing: c.bearing,
            pitch: c.pitch,
        }
    }
}

impl From<CameraPose> for mb_camera_options {
    fn from(c: CameraPose) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
            zoom: c.zoom,
            bearing: c.bearing,
            pitch: c.pitch,
        }
    }
}

/// Per-render overlay. `mode` and `pixel_ratio` are carried but not applied.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct mb_render_options {
    /// Resize applied when both extents are positive.
    pub size: mb_size,
    /// Informational.
    pub pixel_ratio: f32,
    /// Camera applied before rendering.
    pub camera: mb_camera_options,
    /// Informational; one of the `MB_MAP_MODE_*` values.
    pub mode: u32,
    /// Debug bitmask applied before rendering.
    pub debug: u32,
}

impl From<&mb_render_options> for RenderOptions {
    fn from(o: &mb_render_options) -> Self {
        Self {
            size: o.size.into(),
            pixel_ratio: o.pixel_ratio,
            camera: o.camera.into(),
            mode: map_mode_from_raw(o.mode),
            debug: DebugFlags::from_bits(o.debug),
        }
    }
}

/// Rendered frame: premultiplied RGBA, `data_len == width * height * 4`.
///
/// Filled by the bridge; released with `mb_image_free`.
#[repr(C)]
#[derive(Debug)]
pub struct mb_image_data {
    /// Pixel bytes, or null when empty.
    pub data: *mut u8,
    /// Byte length of `data`.
    pub data_len: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl mb_image_data {
    /// An empty record.
    pub const fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            data_len: 0,
            width: 0,
            height: 0,
        }
    }
}

impl Default for mb_image_data {
    fn default() -> Self {
        Self::empty()
    }
}

/// Resource request handed to a loader callback.
#[repr(C)]
#[derive(Debug)]
pub struct mb_resource_request {
    /// NUL-terminated URL, valid for the duration of the callback.
    pub url: *const c_char,
    /// 0 Unknown, 1 Style, 2 Source, 3 Tile, 4 Glyphs, 5 SpriteImage, 6 SpriteJSON.
    pub kind: u8,
}

/// Loader callback output. Zeroed by the bridge before each call.
///
/// `data` and `error` only need to stay valid until the callback returns.
#[repr(C)]
#[derive(Debug)]
pub struct mb_resource_response {
    /// Response body.
    pub data: *const u8,
    /// Byte length of `data`.
    pub data_len: usize,
    /// NUL-terminated error message, or null.
    pub error: *const c_char,
    /// Set when the resource does not exist.
    pub not_found: bool,
    /// Set when the fetch timed out.
    pub timed_out: bool,
}

impl Default for mb_resource_response {
    fn default() -> Self {
        Self {
            data: std::ptr::null(),
            data_len: 0,
            error: std::ptr::null(),
            not_found: false,
            timed_out: false,
        }
    }
}

/// Completion callback for `mb_map_render_still_async`.
pub type mb_render_callback =
    Option<unsafe extern "C" fn(code: mb_error_code, image: *mut mb_image_data, user_data: *mut c_void)>;

/// Resource loader callback for `mb_map_create_with_loader`.
pub type mb_resource_callback = Option<
    unsafe extern "C" fn(
        request: *const mb_resource_request,
        response: *mut mb_resource_response,
        user_data: *mut c_void,
    ),
>;
