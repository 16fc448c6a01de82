// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render targets: a size and pixel ratio mirror over an owned headless frontend.

use mapbridge_engine::{HeadlessFrontend, Size};
use tracing::debug;

use crate::context::{ensure_run_loop, require_initialized};
use crate::error::BridgeError;

/// Off-screen surface that maps render into.
///
/// A target can back several maps one after another. Maps do not keep it
/// alive; callers drop maps before their target.
#[derive(Debug)]
pub struct RenderTarget {
    size: Size,
    pixel_ratio: f32,
    frontend: HeadlessFrontend,
}

impl RenderTarget {
    /// Creates a target. Both extents must be non-zero and the pixel ratio
    /// finite and positive.
    pub fn new(size: Size, pixel_ratio: f32) -> Result<Self, BridgeError> {
        require_initialized()?;
        if size.is_empty() {
            return Err(BridgeError::invalid(format!(
                "render target size must be positive, got {}x{}",
                size.width, size.height
            )));
        }
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(BridgeError::invalid(format!(
                "pixel ratio must be finite and positive, got {pixel_ratio}"
            )));
        }
        ensure_run_loop()?;
        let frontend = HeadlessFrontend::new(size, pixel_ratio)
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        debug!(?size, pixel_ratio, "render target created");
        Ok(Self {
            size,
            pixel_ratio,
            frontend,
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

    /// Resizes the target and its surface. Sizes with a zero extent are ignored.
    pub fn set_size(&mut self, size: Size) -> Result<(), BridgeError> {
        if size.is_empty() {
            return Ok(());
        }
        ensure_run_loop()?;
        self.size = size;
        self.frontend.set_size(size);
        Ok(())
    }

    pub(crate) fn frontend_mut(&mut self) -> &mut HeadlessFrontend {
        &mut self.frontend
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        // The frontend is an engine object; give this thread a context first.
        let _ = ensure_run_loop();
        debug!(size = ?self.size, "render target destroyed");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::context::initialize;

    #[test]
    fn zero_extents_and_bad_ratios_are_rejected() {
        initialize().unwrap();
        for (size, ratio) in [
            (Size::new(0, 10), 1.0),
            (Size::new(10, 0), 1.0),
            (Size::new(10, 10), 0.0),
            (Size::new(10, 10), f32::NAN),
        ] {
            let err = RenderTarget::new(size, ratio).unwrap_err();
            assert!(matches!(err, BridgeError::InvalidArgument(_)), "{size:?} @ {ratio}");
        }
    }

    #[test]
    fn set_size_ignores_zero_extents() {
        initialize().unwrap();
        let mut target = RenderTarget::new(Size::new(64, 32), 2.0).unwrap();
        target.set_size(Size::new(0, 5)).unwrap();
        assert_eq!(target.size(), Size::new(64, 32));
        target.set_size(Size::new(16, 8)).unwrap();
        assert_eq!(target.size(), Size::new(16, 8));
        assert_eq!(target.frontend_mut().size(), Size::new(16, 8));
    }
}
