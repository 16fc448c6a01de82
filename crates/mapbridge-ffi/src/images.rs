// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Style image registry passthrough.

use mapbridge_engine::{premultiply, Size, StyleImage, UnassociatedImage};
use tracing::debug;

use crate::context::ensure_run_loop;
use crate::error::BridgeError;
use crate::map::MapState;

impl MapState {
    /// Registers a straight-alpha RGBA image under `id`, replacing any
    /// existing image with that id. `rgba` must hold at least
    /// `width * height * 4` bytes; extra bytes are ignored.
    pub fn add_image(
        &mut self,
        id: &str,
        rgba: &[u8],
        width: u32,
        height: u32,
        pixel_ratio: f32,
        sdf: bool,
    ) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        let size = Size::new(width, height);
        let len = size
            .rgba_len()
            .ok_or_else(|| BridgeError::invalid(format!("image {width}x{height} is too large")))?;
        let pixels = rgba.get(..len).ok_or_else(|| {
            BridgeError::invalid(format!(
                "image `{id}` needs {len} bytes, got {}",
                rgba.len()
            ))
        })?;
        let image = UnassociatedImage::new(size, pixels.to_vec())
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        let image = StyleImage::new(id, premultiply(image), pixel_ratio, sdf)
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        let replaced = self.engine_map_mut().style_mut().add_image(image).is_some();
        debug!(id, width, height, replaced, "style image added");
        Ok(())
    }

    /// Removes the image registered under `id`. Missing ids are not an error.
    pub fn remove_image(&mut self, id: &str) -> Result<(), BridgeError> {
        ensure_run_loop()?;
        let removed = self.engine_map_mut().style_mut().remove_image(id).is_some();
        debug!(id, removed, "style image removed");
        Ok(())
    }

    /// Whether the active style has an image registered under `id`.
    pub fn has_image(&self, id: &str) -> bool {
        self.engine_map().style().image(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::context::initialize;
    use crate::target::RenderTarget;
    use mapbridge_engine::MapMode;

    fn map() -> (RenderTarget, MapState) {
        initialize().unwrap();
        let target = RenderTarget::new(Size::new(8, 8), 1.0).unwrap();
        let mut map = MapState::new(&target, 1.0, MapMode::Static).unwrap();
        map.load_style(r#"{"version":8,"layers":[]}"#).unwrap();
        (target, map)
    }

    #[test]
    fn added_images_are_premultiplied_and_replaceable() {
        let (_target, mut map) = map();
        map.add_image("pin", &[255, 0, 0, 128], 1, 1, 1.0, false).unwrap();
        map.add_image("pin", &[0, 255, 0, 255], 1, 1, 2.0, true).unwrap();
        let style = map.engine_map().style();
        let image = style.image("pin").unwrap();
        assert_eq!(image.image().pixel(0, 0), Some([0, 255, 0, 255]));
        assert!(image.is_sdf());
    }

    #[test]
    fn short_buffers_and_bad_images_are_rejected() {
        let (_target, mut map) = map();
        assert!(matches!(
            map.add_image("a", &[0; 3], 1, 1, 1.0, false),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            map.add_image("a", &[], 0, 0, 1.0, false),
            Err(BridgeError::Unknown(_))
        ));
        assert!(matches!(
            map.add_image("a", &[0; 4], 1, 1, 0.0, false),
            Err(BridgeError::Unknown(_))
        ));
    }

    #[test]
    fn removing_a_missing_image_is_ok() {
        let (_target, mut map) = map();
        map.remove_image("ghost").unwrap();
        map.add_image("pin", &[0; 4], 1, 1, 1.0, false).unwrap();
        map.remove_image("pin").unwrap();
        assert!(!map.has_image("pin"));
    }
}
