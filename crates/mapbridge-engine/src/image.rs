// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! RGBA rasters tagged with their alpha convention.

use std::fmt;
use std::marker::PhantomData;

use crate::{EngineError, Size};

mod sealed {
    pub trait Sealed {}
}

/// Alpha convention of an [`Image`]'s color channels.
pub trait AlphaMode: sealed::Sealed {
    /// Short name used in debug output.
    const NAME: &'static str;
}

/// Color channels are pre-scaled by alpha.
#[derive(Debug)]
pub enum Premultiplied {}

/// Color channels are independent of alpha (straight alpha).
#[derive(Debug)]
pub enum Unassociated {}

impl sealed::Sealed for Premultiplied {}
impl sealed::Sealed for Unassociated {}

impl AlphaMode for Premultiplied {
    const NAME: &'static str = "premultiplied";
}

impl AlphaMode for Unassociated {
    const NAME: &'static str = "unassociated";
}

/// Tightly packed 8-bit RGBA raster.
pub struct Image<A: AlphaMode> {
    size: Size,
    data: Vec<u8>,
    _alpha: PhantomData<A>,
}

/// Raster whose color channels are premultiplied by alpha.
pub type PremultipliedImage = Image<Premultiplied>;
/// Raster with straight alpha.
pub type UnassociatedImage = Image<Unassociated>;

impl<A: AlphaMode> Image<A> {
    /// Wraps `data`, which must hold exactly `width * height * 4` bytes.
    pub fn new(size: Size, data: Vec<u8>) -> Result<Self, EngineError> {
        let expected = size.rgba_len().ok_or_else(|| {
            EngineError::InvalidImage(format!(
                "{}x{} overflows the addressable size",
                size.width, size.height
            ))
        })?;
        if data.len() != expected {
            return Err(EngineError::InvalidImage(format!(
                "expected {expected} bytes for {}x{}, got {}",
                size.width,
                size.height,
                data.len()
            )));
        }
        Ok(Self {
            size,
            data,
            _alpha: PhantomData,
        })
    }

    /// Fully transparent raster of `size`.
    ///
    /// Fails with [`EngineError::Allocation`] instead of aborting when the
    /// buffer cannot be reserved.
    pub fn transparent(size: Size) -> Result<Self, EngineError> {
        let len = size.rgba_len().ok_or_else(|| {
            EngineError::InvalidImage(format!(
                "{}x{} overflows the addressable size",
                size.width, size.height
            ))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| EngineError::Allocation {
                bytes: len,
                width: size.width,
                height: size.height,
            })?;
        data.resize(len, 0);
        Self::new(size, data)
    }

    /// Pixel dimensions.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Byte length of the pixel data.
    pub fn bytes(&self) -> usize {
        self.data.len()
    }

    /// True when the raster holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pixel bytes, row-major RGBA.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the image and returns its pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Reads the pixel at (`x`, `y`); `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let idx = (y as usize * self.size.width as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    fn retag<B: AlphaMode>(self) -> Image<B> {
        Image {
            size: self.size,
            data: self.data,
            _alpha: PhantomData,
        }
    }
}

impl<A: AlphaMode> Clone for Image<A> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            data: self.data.clone(),
            _alpha: PhantomData,
        }
    }
}

impl<A: AlphaMode> fmt::Debug for Image<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("alpha", &A::NAME)
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Scales color channels by alpha.
pub fn premultiply(image: UnassociatedImage) -> PremultipliedImage {
    let mut image = image;
    for px in image.data.chunks_exact_mut(4) {
        let alpha = u32::from(px[3]);
        for channel in &mut px[..3] {
            *channel = ((u32::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
    image.retag()
}

/// Divides color channels by alpha; fully transparent pixels become zero.
pub fn unpremultiply(image: PremultipliedImage) -> UnassociatedImage {
    let mut image = image;
    for px in image.data.chunks_exact_mut(4) {
        let alpha = u32::from(px[3]);
        if alpha == 0 {
            px[..3].fill(0);
            continue;
        }
        for channel in &mut px[..3] {
            *channel = ((u32::from(*channel) * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
    image.retag()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        let err = UnassociatedImage::new(Size::new(2, 2), vec![0; 15]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidImage(_)));
    }

    #[test]
    fn premultiply_scales_by_alpha() {
        let image = UnassociatedImage::new(Size::new(2, 1), vec![255, 128, 0, 128, 10, 20, 30, 255])
            .unwrap();
        let image = premultiply(image);
        assert_eq!(image.pixel(0, 0), Some([128, 64, 0, 128]));
        assert_eq!(image.pixel(1, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn unpremultiply_restores_opaque_and_clears_transparent() {
        let image =
            PremultipliedImage::new(Size::new(2, 1), vec![128, 64, 0, 128, 9, 9, 9, 0]).unwrap();
        let image = unpremultiply(image);
        assert_eq!(image.pixel(0, 0), Some([255, 128, 0, 128]));
        assert_eq!(image.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn unreservable_raster_is_an_error() {
        // 2^31 * 2^30 * 4 bytes exceeds isize::MAX.
        let size = Size::new(1 << 31, 1 << 30);
        let err = PremultipliedImage::transparent(size).unwrap_err();
        assert!(err.is_allocation());
    }

    #[test]
    fn pixel_outside_raster_is_none() {
        let image = PremultipliedImage::transparent(Size::new(1, 1)).unwrap();
        assert_eq!(image.pixel(1, 0), None);
    }
}
