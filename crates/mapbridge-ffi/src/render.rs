// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Still-image rendering.

use std::f64::consts::PI;

use mapbridge_engine::{MapMode, Size, TILE_SIZE};
use tracing::debug;

use crate::buffer::ImageBuffer;
use crate::context::ensure_run_loop;
use crate::error::BridgeError;
use crate::map::{CameraPose, DebugFlags, MapState};
use crate::target::RenderTarget;

/// Overlay applied right before one render.
///
/// Only `size` (when both extents are positive), `camera` and `debug` are
/// applied, and they stay applied after the render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Target resize.
    pub size: Size,
    /// Carried for callers; not applied.
    pub pixel_ratio: f32,
    /// Camera to jump to.
    pub camera: CameraPose,
    /// Carried for callers; not applied.
    pub mode: MapMode,
    /// Debug flags to set.
    pub debug: DebugFlags,
}

/// Renders one frame of `map` into `target` and copies it out.
///
/// Fails with `NotLoaded` before any accepted style load, with `Timeout` when
/// a resource loader timed out, with `Unknown` when a frame buffer cannot be
/// allocated, and with `RenderFailed` for every other engine failure
/// (including giving up on an outstanding style fetch) or an empty frame.
pub fn render_still(
    map: &mut MapState,
    target: &mut RenderTarget,
    options: Option<&RenderOptions>,
) -> Result<ImageBuffer, BridgeError> {
    if !map.style_loaded() {
        return Err(BridgeError::NotLoaded);
    }
    ensure_run_loop()?;
    if let Some(options) = options {
        if !options.size.is_empty() {
            map.set_size(target, options.size)?;
        }
        map.set_camera(options.camera)?;
        map.set_debug(options.debug)?;
    }
    let result = target
        .frontend_mut()
        .render(map.engine_map_mut())
        .map_err(|err| BridgeError::from_render(&err))?;
    if result.image.is_empty() {
        return Err(BridgeError::RenderFailed("render produced an empty image".into()));
    }
    let buffer = ImageBuffer::copy_from(&result.image)?;
    debug!(width = buffer.width(), height = buffer.height(), "still rendered");
    Ok(buffer)
}

/// Runs [`render_still`] and hands the outcome to `callback` before returning.
///
/// The call is synchronous; `callback` runs exactly once on the calling thread.
pub fn render_still_async<F>(
    map: &mut MapState,
    target: &mut RenderTarget,
    options: Option<&RenderOptions>,
    callback: F,
) where
    F: FnOnce(Result<ImageBuffer, BridgeError>),
{
    callback(render_still(map, target, options));
}

/// Camera centered on Web Mercator tile `z/x/y` at 512-pixel tile scale.
pub fn tile_camera(z: u8, x: u32, y: u32) -> CameraPose {
    let n = 2f64.powi(i32::from(z));
    let longitude = (f64::from(x) + 0.5) / n * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * (f64::from(y) + 0.5) / n))
        .sinh()
        .atan()
        .to_degrees();
    CameraPose {
        latitude,
        longitude,
        zoom: f64::from(z),
        bearing: 0.0,
        pitch: 0.0,
    }
}

/// Renders tile `z/x/y` as a `tile_size` square.
///
/// The target is resized and the camera moved; both persist. Debug flags are
/// left as they are.
pub fn render_tile(
    map: &mut MapState,
    target: &mut RenderTarget,
    z: u8,
    x: u32,
    y: u32,
    tile_size: u32,
) -> Result<ImageBuffer, BridgeError> {
    let limit = 1u64 << z.min(32);
    if z > 30 || u64::from(x) >= limit || u64::from(y) >= limit {
        return Err(BridgeError::invalid(format!("tile {z}/{x}/{y} is out of range")));
    }
    if tile_size == 0 {
        return Err(BridgeError::invalid("tile size must be positive"));
    }
    let mut camera = tile_camera(z, x, y);
    camera.zoom += (f64::from(tile_size) / TILE_SIZE).log2();
    let options = RenderOptions {
        size: Size::new(tile_size, tile_size),
        pixel_ratio: target.pixel_ratio(),
        camera,
        mode: map.mode(),
        debug: map.debug(),
    };
    render_still(map, target, Some(&options))
}
