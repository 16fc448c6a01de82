// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Off-screen rendering surface.

use tracing::trace;

use crate::raster::Frame;
use crate::{EngineError, Map, PremultipliedImage, RunLoop, Size, LOG_TARGET};

/// Output of one [`HeadlessFrontend::render`] call.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Rendered frame at physical resolution, premultiplied alpha.
    pub image: PremultipliedImage,
}

/// Off-screen surface a [`Map`] renders into.
#[derive(Debug)]
pub struct HeadlessFrontend {
    size: Size,
    pixel_ratio: f32,
    frames: u64,
}

impl HeadlessFrontend {
    /// Creates a surface of logical `size`. Requires a run loop.
    pub fn new(size: Size, pixel_ratio: f32) -> Result<Self, EngineError> {
        RunLoop::require()?;
        Ok(Self {
            size,
            pixel_ratio,
            frames: 0,
        })
    }

    /// Logical size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Device pixels per logical pixel.
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Resizes the surface. Takes effect on the next render.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Renders one still frame of `map` at this surface's size.
    ///
    /// Waits up to the map's fetch timeout for an outstanding style fetch
    /// first, failing with [`EngineError::FetchPending`] if it is still
    /// running. Fails with [`EngineError::StyleNotLoaded`] when the map has no
    /// style, with the stored load error when the last style load failed, and
    /// with [`EngineError::Allocation`] when the frame cannot be allocated.
    pub fn render(&mut self, map: &mut Map) -> Result<RenderResult, EngineError> {
        RunLoop::require()?;
        map.settle()?;
        let frame = Frame {
            logical: self.size,
            pixel_ratio: self.pixel_ratio,
            camera: map.camera_options(),
            debug: map.debug(),
            mode: map.mode(),
        };
        let image = frame.draw(map.style())?;
        self.frames += 1;
        trace!(target: LOG_TARGET, frame = self.frames, size = ?image.size(), "frame rendered");
        map.notify_frame();
        Ok(RenderResult { image })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{MapOptions, NullObserver, ResourceOptions};

    #[test]
    fn render_scales_by_pixel_ratio() {
        std::thread::spawn(|| {
            let _run_loop = RunLoop::new().unwrap();
            let mut frontend = HeadlessFrontend::new(Size::new(10, 6), 2.0).unwrap();
            let mut map = Map::new(
                Box::new(NullObserver),
                MapOptions::default().with_size(Size::new(10, 6)).with_pixel_ratio(2.0),
                ResourceOptions::default(),
            )
            .unwrap();
            map.load_style_json(r#"{"version":8,"layers":[]}"#).unwrap();
            let result = frontend.render(&mut map).unwrap();
            assert_eq!(result.image.size(), Size::new(20, 12));
            assert_eq!(frontend.frames(), 1);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn render_without_style_fails() {
        std::thread::spawn(|| {
            let _run_loop = RunLoop::new().unwrap();
            let mut frontend = HeadlessFrontend::new(Size::new(4, 4), 1.0).unwrap();
            let mut map = Map::new(
                Box::new(NullObserver),
                MapOptions::default(),
                ResourceOptions::default(),
            )
            .unwrap();
            assert_eq!(
                frontend.render(&mut map).unwrap_err(),
                EngineError::StyleNotLoaded
            );
        })
        .join()
        .unwrap();
    }
}
