// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sizes, camera state, map modes and debug flags.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Width and height in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent.
    pub width: u32,
    /// Vertical extent.
    pub height: u32,
}

impl Size {
    /// Builds a size from its two extents.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either extent is zero.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes an RGBA raster of this size occupies, or `None` on overflow.
    pub fn rgba_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    /// Scales both extents by `ratio`, rounding to the nearest pixel.
    pub fn scaled(self, ratio: f32) -> Self {
        let scale = |v: u32| (f64::from(v) * f64::from(ratio)).round().max(0.0) as u32;
        Self::new(scale(self.width), scale(self.height))
    }
}

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl LatLng {
    /// Builds a coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Camera pose; every field is optional and `None` means "leave unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraOptions {
    /// Map center.
    pub center: Option<LatLng>,
    /// Zoom level.
    pub zoom: Option<f64>,
    /// Bearing in degrees, clockwise from north.
    pub bearing: Option<f64>,
    /// Pitch in degrees away from the nadir.
    pub pitch: Option<f64>,
}

impl CameraOptions {
    /// Sets the center.
    pub fn with_center(mut self, center: LatLng) -> Self {
        self.center = Some(center);
        self
    }

    /// Sets the zoom.
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    /// Sets the bearing.
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Sets the pitch.
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    /// Overlays the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: &Self) {
        if other.center.is_some() {
            self.center = other.center;
        }
        if other.zoom.is_some() {
            self.zoom = other.zoom;
        }
        if other.bearing.is_some() {
            self.bearing = other.bearing;
        }
        if other.pitch.is_some() {
            self.pitch = other.pitch;
        }
    }
}

/// How the map schedules its work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapMode {
    /// One-shot still images; rendering waits for every resource.
    #[default]
    Static,
    /// Single tiles; identical to `Static` for the reference engine except
    /// that tile borders are aligned to the rendered frame.
    Tile,
}

/// Engine debug visualization flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MapDebugOptions(u32);

impl MapDebugOptions {
    /// No debug overlays.
    pub const NO_DEBUG: Self = Self(0);
    /// Outline every tile.
    pub const TILE_BORDERS: Self = Self(1 << 1);
    /// Tint tiles by parse state.
    pub const PARSE_STATUS: Self = Self(1 << 2);
    /// Stamp tiles with their load time.
    pub const TIMESTAMPS: Self = Self(1 << 3);
    /// Show label collision boxes.
    pub const COLLISION: Self = Self(1 << 4);
    /// Visualize overdraw.
    pub const OVERDRAW: Self = Self(1 << 5);

    /// Builds flags from raw bits; unknown bits are kept and ignored.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MapDebugOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MapDebugOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
