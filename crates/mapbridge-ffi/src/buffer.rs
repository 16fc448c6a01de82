// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Boundary-owned pixel buffers.
//!
//! A rendered frame is copied out of the engine into a `Box<[u8]>` owned by
//! the bridge. [`ImageBuffer::into_raw`] hands that allocation to C exactly
//! once; [`free_raw`] takes it back and zeroes the record so a second free is
//! a no-op.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use mapbridge_engine::{unpremultiply, PremultipliedImage, Size};

use crate::error::BridgeError;
use crate::types::mb_image_data;

/// Output encodings for a rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodedFormat {
    /// Lossless, straight alpha.
    Png,
    /// Lossy, no alpha.
    Jpeg,
    /// Lossless, straight alpha.
    WebP,
}

impl EncodedFormat {
    /// Parses a format name or file extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// MIME type of the encoded bytes.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

/// Premultiplied RGBA frame owned by the bridge.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    data: Box<[u8]>,
    width: u32,
    height: u32,
}

impl ImageBuffer {
    /// Copies `image` into a fresh allocation of exactly `width * height * 4` bytes.
    pub fn copy_from(image: &PremultipliedImage) -> Result<Self, BridgeError> {
        let size = image.size();
        let len = size
            .rgba_len()
            .ok_or_else(|| BridgeError::Unknown("image size overflows".into()))?;
        let src = image
            .data()
            .get(..len)
            .ok_or_else(|| BridgeError::Unknown("engine image is shorter than its size".into()))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|err| BridgeError::Unknown(format!("failed to allocate {len} bytes: {err}")))?;
        data.extend_from_slice(src);
        Ok(Self {
            data: data.into_boxed_slice(),
            width: size.width,
            height: size.height,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn straight_rgba(&self) -> Result<image::RgbaImage, BridgeError> {
        let size = Size::new(self.width, self.height);
        let premultiplied = PremultipliedImage::new(size, self.data.to_vec())
            .map_err(|err| BridgeError::Unknown(err.to_string()))?;
        let straight = unpremultiply(premultiplied);
        image::RgbaImage::from_raw(self.width, self.height, straight.into_data())
            .ok_or_else(|| BridgeError::Unknown("pixel buffer does not match its size".into()))
    }

    /// Encodes the frame as PNG after converting back to straight alpha.
    pub fn to_png(&self) -> Result<Vec<u8>, BridgeError> {
        let rgba = self.straight_rgba()?;
        let mut out = Cursor::new(Vec::new());
        rgba.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|err| BridgeError::Unknown(format!("png encode failed: {err}")))?;
        Ok(out.into_inner())
    }

    /// Encodes the frame as JPEG. Alpha is dropped; `quality` is clamped to 1..=100.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, BridgeError> {
        let rgb = DynamicImage::ImageRgba8(self.straight_rgba()?).to_rgb8();
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| BridgeError::Unknown(format!("jpeg encode failed: {err}")))?;
        Ok(out)
    }

    /// Encodes the frame as lossless WebP with straight alpha.
    pub fn to_webp(&self) -> Result<Vec<u8>, BridgeError> {
        let rgba = self.straight_rgba()?;
        let mut out = Cursor::new(Vec::new());
        rgba.write_to(&mut out, image::ImageFormat::WebP)
            .map_err(|err| BridgeError::Unknown(format!("webp encode failed: {err}")))?;
        Ok(out.into_inner())
    }

    /// Encodes the frame in `format`; `quality` only affects JPEG.
    pub fn encode(&self, format: EncodedFormat, quality: u8) -> Result<Vec<u8>, BridgeError> {
        match format {
            EncodedFormat::Png => self.to_png(),
            EncodedFormat::Jpeg => self.to_jpeg(quality),
            EncodedFormat::WebP => self.to_webp(),
        }
    }

    /// Hands the allocation to C. Release it with [`free_raw`].
    pub fn into_raw(self) -> mb_image_data {
        let data_len = self.data.len();
        let data = Box::into_raw(self.data).cast::<u8>();
        mb_image_data {
            data,
            data_len,
            width: self.width,
            height: self.height,
        }
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Frees a buffer produced by [`ImageBuffer::into_raw`] and zeroes the record.
/// Records with a null `data` pointer are left untouched.
///
/// # Safety
/// `image.data` must be null or come from [`ImageBuffer::into_raw`] with
/// `image.data_len` unchanged, and must not have been freed already through
/// another copy of the record.
pub unsafe fn free_raw(image: &mut mb_image_data) {
    if image.data.is_null() {
        return;
    }
    let slice = std::ptr::slice_from_raw_parts_mut(image.data, image.data_len);
    drop(unsafe { Box::from_raw(slice) });
    *image = mb_image_data::empty();
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn frame() -> PremultipliedImage {
        PremultipliedImage::new(Size::new(2, 1), vec![128, 0, 0, 128, 0, 0, 0, 0]).unwrap()
    }

    #[test]
    fn raw_hand_off_frees_once() {
        let buffer = ImageBuffer::copy_from(&frame()).unwrap();
        assert_eq!(buffer.len(), 8);
        let mut raw = buffer.into_raw();
        assert!(!raw.data.is_null());
        assert_eq!((raw.width, raw.height, raw.data_len), (2, 1, 8));
        unsafe { free_raw(&mut raw) };
        assert!(raw.data.is_null());
        assert_eq!((raw.width, raw.height, raw.data_len), (0, 0, 0));
        unsafe { free_raw(&mut raw) };
    }

    #[test]
    fn png_is_straight_alpha() {
        let png = ImageBuffer::copy_from(&frame()).unwrap().to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 128]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 0, 0]);
    }

    fn opaque_frame() -> PremultipliedImage {
        let mut data = Vec::new();
        for _ in 0..64 {
            data.extend_from_slice(&[200, 40, 40, 255]);
        }
        PremultipliedImage::new(Size::new(8, 8), data).unwrap()
    }

    #[test]
    fn jpeg_drops_alpha_and_keeps_color() {
        let buffer = ImageBuffer::copy_from(&opaque_frame()).unwrap();
        let jpeg = buffer.to_jpeg(95).unwrap();
        assert_eq!(
            image::guess_format(&jpeg).unwrap(),
            image::ImageFormat::Jpeg
        );
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert!(!decoded.color().has_alpha());
        let px = decoded.to_rgb8().get_pixel(4, 4).0;
        assert!(px[0].abs_diff(200) < 8 && px[1].abs_diff(40) < 8, "{px:?}");
    }

    #[test]
    fn jpeg_quality_zero_is_clamped() {
        let buffer = ImageBuffer::copy_from(&opaque_frame()).unwrap();
        assert!(!buffer.to_jpeg(0).unwrap().is_empty());
    }

    #[test]
    fn webp_is_lossless_straight_alpha() {
        let webp = ImageBuffer::copy_from(&frame()).unwrap().to_webp().unwrap();
        assert_eq!(
            image::guess_format(&webp).unwrap(),
            image::ImageFormat::WebP
        );
        let decoded = image::load_from_memory(&webp).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 128]);
        assert_eq!(decoded.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn format_names_and_dispatch() {
        assert_eq!(EncodedFormat::from_name("JPG"), Some(EncodedFormat::Jpeg));
        assert_eq!(EncodedFormat::from_name("webp"), Some(EncodedFormat::WebP));
        assert_eq!(EncodedFormat::from_name("gif"), None);
        assert_eq!(EncodedFormat::Png.content_type(), "image/png");
        let buffer = ImageBuffer::copy_from(&frame()).unwrap();
        assert_eq!(buffer.encode(EncodedFormat::Png, 0).unwrap(), buffer.to_png().unwrap());
    }
}
