// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map handles: one engine map plus the bridge-side mirrors of its state.

use std::sync::Arc;

use mapbridge_engine::{
    CameraOptions, FileSource, LatLng, Map, MapDebugOptions, MapMode, MapOptions, NullObserver,
    Size,
};
use tracing::debug;

use crate::context::{ensure_run_loop, require_initialized};
use crate::error::BridgeError;
use crate::settings;
use crate::target::RenderTarget;

/// Engine map mode for a raw C value; anything but 1 (Tile) is Static.
pub const fn map_mode_from_raw(raw: u32) -> MapMode {
    match raw {
        1 => MapMode::Tile,
        _ => MapMode::Static,
    }
}

/// Fully specified camera as seen across the C boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraPose {
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

impl CameraPose {
    /// Flattens engine camera options; unset fields become 0.0.
    pub fn from_engine(camera: &CameraOptions) -> Self {
        let center = camera.center.unwrap_or_default();
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            zoom: camera.zoom.unwrap_or(0.0),
            bearing: camera.bearing.unwrap_or(0.0),
            pitch: camera.pitch.unwrap_or(0.0),
        }
    }

    /// Engine camera options with every field set.
    pub fn to_engine(self) -> CameraOptions {
        CameraOptions::default()
            .with_center(LatLng::new(self.latitude, self.longitude))
            .with_zoom(self.zoom)
            .with_bearing(self.bearing)
            .with_pitch(self.pitch)
    }
}

/// Debug bitmask as defined by the C interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DebugFlags(u32);

impl DebugFlags {
    /// Outline tiles.
    pub const TILE_BORDERS: u32 = 1;
    /// Tile parse state.
    pub const PARSE_STATUS: u32 = 1 << 1;
    /// Tile load timestamps.
    pub const TIMESTAMPS: u32 = 1 << 2;
    /// Collision boxes.
    pub const COLLISION: u32 = 1 << 3;
    /// Overdraw visualization.
    pub const OVERDRAW: u32 = 1 << 4;

    /// Wraps a raw bitmask. Unknown bits are kept but never mapped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Engine flags, one independent bit test per known flag.
    pub fn to_engine(self) -> MapDebugOptions {
        const TABLE: [(u32, MapDebugOptions); 5] = [
            (DebugFlags::TILE_BORDERS, MapDebugOptions::TILE_BORDERS),
            (DebugFlags::PARSE_STATUS, MapDebugOptions::PARSE_STATUS),
            (DebugFlags::TIMESTAMPS, MapDebugOptions::TIMESTAMPS),
            (DebugFlags::COLLISION, MapDebugOptions::COLLISION),
            (DebugFlags::OVERDRAW, MapDebugOptions::OVERDRAW),
        ];
        TABLE
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .fold(MapDebugOptions::NO_DEBUG, |acc, (_, flag)| acc | *flag)
    }
}

/// One engine map and the bridge's view of it.
#[derive(Debug)]
pub struct MapState {
    map: Map,
    mode: MapMode,
    pixel_ratio: f32,
    style_loaded: bool,
    camera: CameraPose,
    debug: DebugFlags,
}

impl MapState {
    /// Creates a map sized after `target`, using the default file source.
    pub fn new(target: &RenderTarget, pixel_ratio: f32, mode: MapMode) -> Result<Self, BridgeError> {
        Self::with_file_source(target, pixel_ratio, mode, None)
    }

    /// Creates a map whose resource requests go through `file_source`, or the
    /// default local source when `None`.
    pub fn with_file_source(
        target: &RenderTarget,
        pixel_ratio: f32,
        mode: MapMode,
        file_source: Option<Arc<dyn FileSource>>,
    ) -> Result<Self, BridgeError> {
        require_initialized()?;
        ensure_run_loop()?;
        let mut resources = settings::resource_options();
        if let Some(source) = file_source {
            resources = resources.with_file_source(source);
        }
        let options = MapOptions::default()
            .with_size(target.size())
            .with_pixel_ratio(target.pixel_ratio())
            .with_mode(mode);
        let map = Map::new(Box::new(NullObserver), options, resources)
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        debug!(?mode, pixel_ratio, size = ?target.size(), "map created");
        Ok(Self {
            map,
            mode,
            pixel_ratio,
            style_loaded: false,
            camera: CameraPose::default(),
            debug: DebugFlags::default(),
        })
    }

    /// Loads a style document synchronously.
    pub fn load_style(&mut self, json: &str) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        self.map
            .load_style_json(json)
            .map_err(|err| BridgeError::StyleParse(err.to_string()))?;
        self.style_loaded = true;
        Ok(())
    }

    /// Starts loading a style from `url`; the fetch completes in the background.
    pub fn load_style_url(&mut self, url: &str) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        self.map
            .load_style_url(url)
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        self.style_loaded = true;
        Ok(())
    }

    /// Engine view of whether the style and its resources are loaded.
    pub fn is_fully_loaded(&mut self) -> bool {
        ensure_run_loop().is_ok() && self.map.is_fully_loaded()
    }

    /// Whether a style load has been accepted.
    pub fn style_loaded(&self) -> bool {
        self.style_loaded
    }

    /// Moves the camera.
    pub fn set_camera(&mut self, camera: CameraPose) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        self.camera = camera;
        self.map.jump_to(&camera.to_engine());
        Ok(())
    }

    /// Camera as reported by the engine, unset fields read as 0.0.
    pub fn camera(&self) -> CameraPose {
        CameraPose::from_engine(&self.map.camera_options())
    }

    /// Camera as reported by the engine, with unset fields preserved.
    pub fn engine_camera(&self) -> CameraOptions {
        self.map.camera_options()
    }

    /// Last camera written through the bridge.
    pub fn camera_mirror(&self) -> CameraPose {
        self.camera
    }

    /// Resizes `target` and then the map. Sizes with a zero extent are ignored.
    pub fn set_size(&mut self, target: &mut RenderTarget, size: Size) -> Result<(), BridgeError> {
        if size.is_empty() {
            return Ok(());
        }
        target.set_size(size)?;
        self.map.set_size(size);
        Ok(())
    }

    /// Logical size the engine map was last given.
    pub fn size(&self) -> Size {
        self.map.size()
    }

    /// Replaces the debug flags.
    pub fn set_debug(&mut self, debug: DebugFlags) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        self.debug = debug;
        self.map.set_debug(debug.to_engine());
        Ok(())
    }

    /// Debug flags last written through the bridge.
    pub fn debug(&self) -> DebugFlags {
        self.debug
    }

    /// Map mode.
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Pixel ratio passed at creation.
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub(crate) fn engine_map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub(crate) fn engine_map(&self) -> &Map {
        &self.map
    }
}

impl Drop for MapState {
    fn drop(&mut self) {
        let _ = ensure_run_loop();
        debug!("map destroyed");
    }
}
