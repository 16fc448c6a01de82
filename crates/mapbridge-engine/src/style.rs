// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Style documents and the style image registry.
//!
//! Parsing follows the version 8 style format closely enough to validate
//! structure (a top-level object, a `layers` array of uniquely named layers, a
//! `sources` object). Only the first visible `background` layer affects the
//! reference renderer.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use tracing::warn;

use crate::{EngineError, PremultipliedImage, LOG_TARGET};

/// Straight-alpha color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Rgba {
    /// Opaque black, the default background color.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Builds a color from straight-alpha channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)` and a few
    /// named colors.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(args) = s.strip_prefix("rgba(").and_then(|r| r.strip_suffix(')')) {
            return Self::parse_functional(args, true);
        }
        if let Some(args) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            return Self::parse_functional(args, false);
        }
        match s.as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::new(1.0, 1.0, 1.0, 1.0)),
            "red" => Some(Self::new(1.0, 0.0, 0.0, 1.0)),
            "green" => Some(Self::new(0.0, 128.0 / 255.0, 0.0, 1.0)),
            "blue" => Some(Self::new(0.0, 0.0, 1.0, 1.0)),
            "transparent" => Some(Self::TRANSPARENT),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..=i)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        let unit = |v: u8| f32::from(v) / 255.0;
        match hex.len() {
            3 => Some(Self::new(
                unit(nibble(0)? * 17),
                unit(nibble(1)? * 17),
                unit(nibble(2)? * 17),
                1.0,
            )),
            6 | 8 => {
                let a = if hex.len() == 8 { unit(byte(6)?) } else { 1.0 };
                Some(Self::new(unit(byte(0)?), unit(byte(2)?), unit(byte(4)?), a))
            }
            _ => None,
        }
    }

    fn parse_functional(args: &str, with_alpha: bool) -> Option<Self> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let expected = if with_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return None;
        }
        let channel = |s: &str| -> Option<f32> {
            let v: f32 = s.parse().ok()?;
            Some((v / 255.0).clamp(0.0, 1.0))
        };
        let alpha = if with_alpha {
            parts[3].parse::<f32>().ok()?.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some(Self::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            alpha,
        ))
    }

    /// Scales alpha by `opacity`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: self.a * opacity.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Premultiplied 8-bit RGBA bytes.
    pub fn to_premultiplied_bytes(self) -> [u8; 4] {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let a = self.a.clamp(0.0, 1.0);
        [
            quantize(self.r * a),
            quantize(self.g * a),
            quantize(self.b * a),
            quantize(a),
        ]
    }
}

/// Named raster registered with the style (markers, icons, patterns).
#[derive(Debug, Clone)]
pub struct StyleImage {
    id: String,
    image: PremultipliedImage,
    pixel_ratio: f32,
    sdf: bool,
}

impl StyleImage {
    /// Validates and builds a style image.
    pub fn new(
        id: impl Into<String>,
        image: PremultipliedImage,
        pixel_ratio: f32,
        sdf: bool,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::InvalidImage("image id is empty".into()));
        }
        if image.is_empty() {
            return Err(EngineError::InvalidImage(format!("image `{id}` has no pixels")));
        }
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(EngineError::InvalidImage(format!(
                "image `{id}` has invalid pixel ratio {pixel_ratio}"
            )));
        }
        Ok(Self {
            id,
            image,
            pixel_ratio,
            sdf,
        })
    }

    /// Registry key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Premultiplied pixels.
    pub fn image(&self) -> &PremultipliedImage {
        &self.image
    }

    /// Device pixels per logical pixel.
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Whether the image is a signed distance field.
    pub fn is_sdf(&self) -> bool {
        self.sdf
    }
}

#[derive(Debug, Deserialize)]
struct StyleDocument {
    version: Option<u64>,
    name: Option<String>,
    #[serde(default)]
    sources: JsonMap<String, Value>,
    #[serde(default)]
    layers: Vec<LayerDocument>,
}

#[derive(Debug, Deserialize)]
struct LayerDocument {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    paint: JsonMap<String, Value>,
    #[serde(default)]
    layout: JsonMap<String, Value>,
}

impl LayerDocument {
    fn is_visible(&self) -> bool {
        self.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }

    fn background(&self) -> Rgba {
        let color = match self.paint.get("background-color") {
            None => Rgba::BLACK,
            Some(Value::String(s)) => Rgba::parse(s).unwrap_or_else(|| {
                warn!(target: LOG_TARGET, layer = %self.id, color = %s, "unparsable background-color");
                Rgba::BLACK
            }),
            Some(other) => {
                warn!(target: LOG_TARGET, layer = %self.id, value = %other, "unsupported background-color value");
                Rgba::BLACK
            }
        };
        let opacity = self
            .paint
            .get("background-opacity")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
        color.with_opacity(opacity as f32)
    }
}

/// Validated contents of one style document.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParsedStyle {
    name: Option<String>,
    source_ids: Vec<String>,
    layer_ids: Vec<String>,
    background: Option<Rgba>,
}

impl ParsedStyle {
    pub(crate) fn parse(json: &str) -> Result<Self, EngineError> {
        let doc: StyleDocument = serde_json::from_str(json)
            .map_err(|err| EngineError::StyleParse(format!("invalid style document: {err}")))?;
        if let Some(version) = doc.version {
            if version != 8 {
                return Err(EngineError::StyleParse(format!(
                    "unsupported style version {version}, expected 8"
                )));
            }
        }
        let mut seen = HashSet::new();
        for layer in &doc.layers {
            if !seen.insert(layer.id.as_str()) {
                return Err(EngineError::StyleParse(format!(
                    "duplicate layer id `{}`",
                    layer.id
                )));
            }
        }
        let background = doc
            .layers
            .iter()
            .find(|layer| layer.kind == "background" && layer.is_visible())
            .map(LayerDocument::background);
        Ok(Self {
            name: doc.name,
            source_ids: doc.sources.keys().cloned().collect(),
            layer_ids: doc.layers.iter().map(|layer| layer.id.clone()).collect(),
            background,
        })
    }
}

/// The map's active style: the loaded document plus registered images.
#[derive(Debug, Clone, Default)]
pub struct Style {
    parsed: Option<ParsedStyle>,
    url: Option<String>,
    images: BTreeMap<String, StyleImage>,
}

impl Style {
    pub(crate) fn replace(&mut self, parsed: ParsedStyle, url: Option<String>) {
        self.parsed = Some(parsed);
        self.url = url;
        self.images.clear();
    }

    /// True once a document has been parsed successfully.
    pub fn is_loaded(&self) -> bool {
        self.parsed.is_some()
    }

    /// URL the document was fetched from, if it came from a URL.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Document `name`, if any.
    pub fn name(&self) -> Option<&str> {
        self.parsed.as_ref().and_then(|p| p.name.as_deref())
    }

    /// Layer ids in document order.
    pub fn layer_ids(&self) -> &[String] {
        self.parsed
            .as_ref()
            .map(|p| p.layer_ids.as_slice())
            .unwrap_or_default()
    }

    /// Source ids.
    pub fn source_ids(&self) -> &[String] {
        self.parsed
            .as_ref()
            .map(|p| p.source_ids.as_slice())
            .unwrap_or_default()
    }

    /// Effective background color; `None` when the style has no visible
    /// background layer.
    pub fn background(&self) -> Option<Rgba> {
        self.parsed.as_ref().and_then(|p| p.background)
    }

    /// Registers `image`, replacing any image with the same id.
    pub fn add_image(&mut self, image: StyleImage) -> Option<StyleImage> {
        self.images.insert(image.id.clone(), image)
    }

    /// Unregisters `id`; unknown ids are ignored.
    pub fn remove_image(&mut self, id: &str) -> Option<StyleImage> {
        self.images.remove(id)
    }

    /// Looks up a registered image.
    pub fn image(&self, id: &str) -> Option<&StyleImage> {
        self.images.get(id)
    }

    /// Registered image ids in sorted order.
    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::Size;

    #[test]
    fn parses_hex_and_functional_colors() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::new(1.0, 1.0, 1.0, 1.0)));
        assert_eq!(Rgba::parse("#ff0000"), Some(Rgba::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(Rgba::parse("rgba(0, 0, 255, 0.5)"), Some(Rgba::new(0.0, 0.0, 1.0, 0.5)));
        assert_eq!(Rgba::parse("rgb(0,0,0)"), Some(Rgba::BLACK));
        assert_eq!(Rgba::parse("#12"), None);
        assert_eq!(Rgba::parse("chartreuse-ish"), None);
    }

    #[test]
    fn premultiplied_bytes_scale_by_alpha() {
        assert_eq!(
            Rgba::new(1.0, 0.5, 0.0, 0.5).to_premultiplied_bytes(),
            [128, 64, 0, 128]
        );
    }

    #[test]
    fn minimal_document_parses() {
        let parsed = ParsedStyle::parse(r#"{"version":8,"sources":{},"layers":[]}"#).unwrap();
        assert!(parsed.layer_ids.is_empty());
        assert_eq!(parsed.background, None);
    }

    #[test]
    fn rejects_malformed_documents() {
        for doc in [
            "{not json",
            "[]",
            r#"{"version":7,"layers":[]}"#,
            r#"{"layers":{}}"#,
            r#"{"layers":[{"id":"a","type":"fill"},{"id":"a","type":"line"}]}"#,
            r#"{"layers":[{"type":"fill"}]}"#,
        ] {
            let err = ParsedStyle::parse(doc).unwrap_err();
            assert!(matches!(err, EngineError::StyleParse(_)), "{doc}: {err:?}");
        }
    }

    #[test]
    fn first_visible_background_wins() {
        let parsed = ParsedStyle::parse(
            r##"{"version":8,"layers":[
                {"id":"hidden","type":"background","layout":{"visibility":"none"},"paint":{"background-color":"#ff0000"}},
                {"id":"bg","type":"background","paint":{"background-color":"#0000ff","background-opacity":0.5}},
                {"id":"late","type":"background","paint":{"background-color":"#00ff00"}}
            ]}"##,
        )
        .unwrap();
        assert_eq!(parsed.background, Some(Rgba::new(0.0, 0.0, 1.0, 0.5)));
    }

    #[test]
    fn loading_a_document_clears_images() {
        let mut style = Style::default();
        let image = PremultipliedImage::transparent(Size::new(1, 1)).unwrap();
        style.add_image(StyleImage::new("pin", image, 1.0, false).unwrap());
        assert!(style.image("pin").is_some());
        style.replace(ParsedStyle::default(), None);
        assert!(style.image("pin").is_none());
    }

    #[test]
    fn style_image_rejects_bad_pixel_ratio() {
        let image = PremultipliedImage::transparent(Size::new(1, 1)).unwrap();
        assert!(StyleImage::new("pin", image.clone(), 0.0, false).is_err());
        assert!(StyleImage::new("pin", image.clone(), f32::NAN, false).is_err());
        assert!(StyleImage::new("", image, 1.0, false).is_err());
    }
}
