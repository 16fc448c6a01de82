// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Software rasterizer behind [`HeadlessFrontend::render`](crate::HeadlessFrontend::render).
//!
//! Draws the style background and the geometric debug overlays. Bearing and
//! pitch are accepted but do not rotate the frame; text overlays
//! (`PARSE_STATUS`, `TIMESTAMPS`) are not drawn.

use std::f64::consts::PI;

use crate::{
    CameraOptions, EngineError, MapDebugOptions, MapMode, PremultipliedImage, Size, Style,
    TILE_SIZE,
};

const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
const TILE_BORDER: [u8; 4] = [255, 0, 0, 255];
const COLLISION_BOX: [u8; 4] = [0, 255, 255, 255];
const OVERDRAW_TINT: [u8; 4] = [0, 0, 64, 64];

/// Everything the rasterizer needs about one frame.
pub(crate) struct Frame {
    pub logical: Size,
    pub pixel_ratio: f32,
    pub camera: CameraOptions,
    pub debug: MapDebugOptions,
    pub mode: MapMode,
}

impl Frame {
    pub(crate) fn draw(&self, style: &Style) -> Result<PremultipliedImage, EngineError> {
        let physical = self.logical.scaled(self.pixel_ratio);
        let mut image = PremultipliedImage::transparent(physical)?;
        if let Some(color) = style.background() {
            fill(&mut image, color.to_premultiplied_bytes());
        }
        if self.debug.contains(MapDebugOptions::TILE_BORDERS) {
            self.draw_tile_borders(&mut image);
        }
        if self.debug.contains(MapDebugOptions::COLLISION) {
            self.draw_collision_box(&mut image);
        }
        if self.debug.contains(MapDebugOptions::OVERDRAW) {
            composite_all(&mut image, OVERDRAW_TINT);
        }
        Ok(image)
    }

    /// World-pixel position of the camera center at the camera zoom.
    fn center_world(&self) -> (f64, f64) {
        let center = self.camera.center.unwrap_or_default();
        let world = TILE_SIZE * 2f64.powf(self.camera.zoom.unwrap_or(0.0));
        let lat = center.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (center.longitude + 180.0) / 360.0 * world;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
        (x, y)
    }

    fn tile_index(&self, center: f64, logical_extent: u32, physical: u32) -> i64 {
        let offset =
            (f64::from(physical) + 0.5) / f64::from(self.pixel_ratio) - f64::from(logical_extent) / 2.0;
        ((center + offset) / TILE_SIZE).floor() as i64
    }

    fn draw_tile_borders(&self, image: &mut PremultipliedImage) {
        let size = image.size();
        let (cx, cy) = self.center_world();
        let aligned = self.mode == MapMode::Tile;
        for x in 0..size.width {
            let edge = x > 0
                && self.tile_index(cx, self.logical.width, x)
                    != self.tile_index(cx, self.logical.width, x - 1);
            if edge || (aligned && (x == 0 || x + 1 == size.width)) {
                for y in 0..size.height {
                    put(image, x, y, TILE_BORDER);
                }
            }
        }
        for y in 0..size.height {
            let edge = y > 0
                && self.tile_index(cy, self.logical.height, y)
                    != self.tile_index(cy, self.logical.height, y - 1);
            if edge || (aligned && (y == 0 || y + 1 == size.height)) {
                for x in 0..size.width {
                    put(image, x, y, TILE_BORDER);
                }
            }
        }
    }

    fn draw_collision_box(&self, image: &mut PremultipliedImage) {
        let size = image.size();
        let half = (8.0 * self.pixel_ratio).round() as u32;
        let (mx, my) = (size.width / 2, size.height / 2);
        let (x0, x1) = (mx.saturating_sub(half), (mx + half).min(size.width.saturating_sub(1)));
        let (y0, y1) = (my.saturating_sub(half), (my + half).min(size.height.saturating_sub(1)));
        for x in x0..=x1 {
            put(image, x, y0, COLLISION_BOX);
            put(image, x, y1, COLLISION_BOX);
        }
        for y in y0..=y1 {
            put(image, x0, y, COLLISION_BOX);
            put(image, x1, y, COLLISION_BOX);
        }
    }
}

fn fill(image: &mut PremultipliedImage, px: [u8; 4]) {
    for dst in image.data_mut().chunks_exact_mut(4) {
        dst.copy_from_slice(&px);
    }
}

fn put(image: &mut PremultipliedImage, x: u32, y: u32, px: [u8; 4]) {
    let width = image.size().width as usize;
    let idx = (y as usize * width + x as usize) * 4;
    if let Some(dst) = image.data_mut().get_mut(idx..idx + 4) {
        dst.copy_from_slice(&px);
    }
}

/// Premultiplied source-over of `src` onto every pixel.
fn composite_all(image: &mut PremultipliedImage, src: [u8; 4]) {
    let inv = 255 - u32::from(src[3]);
    for dst in image.data_mut().chunks_exact_mut(4) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = (u32::from(s) + (u32::from(*d) * inv + 127) / 255).min(255) as u8;
        }
    }
}
