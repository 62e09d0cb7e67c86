//! Watermark compositing
//!
//! Places a shared RGBA mark over the host image at one of nine anchors. The
//! mark is sized relative to the host width and blended per pixel with
//! `mark_alpha * opacity`; host dimensions and color space never change.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::decode::{DecodeError, Image};
use crate::error::RenderError;

/// A decoded watermark, shared read-only between renders.
#[derive(Clone, PartialEq)]
pub struct WatermarkAsset {
    image: RgbaImage,
}

impl WatermarkAsset {
    /// Decode a mark from PNG, JPEG or TIFF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::InvalidFormat);
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
        Self::from_rgba(img.into_rgba8())
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self, DecodeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DecodeError::InvalidDimensions {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(Self { image })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for WatermarkAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatermarkAsset")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Where the mark sits on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    #[default]
    BottomRight,
}

impl Anchor {
    /// Horizontal and vertical placement: 0 = start, 1 = middle, 2 = end.
    fn cells(self) -> (u8, u8) {
        match self {
            Anchor::TopLeft => (0, 0),
            Anchor::Top => (1, 0),
            Anchor::TopRight => (2, 0),
            Anchor::Left => (0, 1),
            Anchor::Center => (1, 1),
            Anchor::Right => (2, 1),
            Anchor::BottomLeft => (0, 2),
            Anchor::Bottom => (1, 2),
            Anchor::BottomRight => (2, 2),
        }
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "TOP_LEFT" => Ok(Anchor::TopLeft),
            "TOP" => Ok(Anchor::Top),
            "TOP_RIGHT" => Ok(Anchor::TopRight),
            "LEFT" => Ok(Anchor::Left),
            "CENTER" | "CENTRE" => Ok(Anchor::Center),
            "RIGHT" => Ok(Anchor::Right),
            "BOTTOM_LEFT" => Ok(Anchor::BottomLeft),
            "BOTTOM" => Ok(Anchor::Bottom),
            "BOTTOM_RIGHT" => Ok(Anchor::BottomRight),
            _ => Err(format!("unknown anchor '{s}'")),
        }
    }
}

/// How a watermark is applied to a render.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    pub asset: Arc<WatermarkAsset>,
    pub anchor: Anchor,
    /// Global opacity multiplier (0-1)
    pub opacity: f32,
    /// Mark width as a fraction of host width, in (0, 1]
    pub scale: f32,
    /// Inset from the anchored edges as a fraction of the host's shorter edge
    pub margin: f32,
}

impl WatermarkSpec {
    pub const DEFAULT_OPACITY: f32 = 0.6;
    pub const DEFAULT_SCALE: f32 = 0.2;
    pub const DEFAULT_MARGIN: f32 = 0.02;

    pub fn new(asset: Arc<WatermarkAsset>) -> Self {
        Self {
            asset,
            anchor: Anchor::default(),
            opacity: Self::DEFAULT_OPACITY,
            scale: Self::DEFAULT_SCALE,
            margin: Self::DEFAULT_MARGIN,
        }
    }

    /// # Errors
    ///
    /// Returns `RenderError::InvalidParameter` for an opacity outside
    /// `[0, 1]`, a scale outside `(0, 1]` or a margin outside `[0, 0.5)`.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(RenderError::invalid(
                "watermark.opacity",
                format!("{} is outside [0, 1]", self.opacity),
            ));
        }
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(RenderError::invalid(
                "watermark.scale",
                format!("{} is outside (0, 1]", self.scale),
            ));
        }
        if !(0.0..0.5).contains(&self.margin) {
            return Err(RenderError::invalid(
                "watermark.margin",
                format!("{} is outside [0, 0.5)", self.margin),
            ));
        }
        Ok(())
    }
}

/// Blend the mark described by `spec` onto `image`.
pub fn composite(mut image: Image, spec: &WatermarkSpec) -> Image {
    if spec.opacity <= 0.0 {
        return image;
    }

    let (host_w, host_h) = image.dimensions();
    let margin = (spec.margin * host_w.min(host_h) as f32).round() as u32;
    let (mark_w, mark_h) = mark_dimensions(spec, host_w, host_h, margin);

    let mark = if (mark_w, mark_h) == spec.asset.dimensions() {
        spec.asset.image.clone()
    } else {
        imageops::resize(&spec.asset.image, mark_w, mark_h, FilterType::Lanczos3)
    };

    let (x0, y0) = placement(spec.anchor, (host_w, host_h), (mark_w, mark_h), margin);
    tracing::debug!(
        mark_width = mark_w,
        mark_height = mark_h,
        x = x0,
        y = y0,
        anchor = ?spec.anchor,
        "compositing watermark"
    );

    let channels = image.layout().channels();
    let has_alpha = image.layout().has_alpha();
    let row_stride = host_w as usize * channels;
    let pixels = image.pixels_mut();

    for (mx, my, mark_px) in mark.enumerate_pixels() {
        let alpha = f32::from(mark_px[3]) / 255.0 * spec.opacity;
        if alpha <= 0.0 {
            continue;
        }
        let idx = (y0 + my) as usize * row_stride + (x0 + mx) as usize * channels;
        let host = &mut pixels[idx..idx + channels];

        if has_alpha {
            blend_over_rgba(host, mark_px.0, alpha);
        } else {
            for c in 0..3 {
                let blended = f32::from(host[c]) * (1.0 - alpha) + f32::from(mark_px[c]) * alpha;
                host[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    image
}

/// Mark size: `round(host_w * scale)` wide with the asset's aspect ratio,
/// shrunk to fit inside the host minus margins.
fn mark_dimensions(spec: &WatermarkSpec, host_w: u32, host_h: u32, margin: u32) -> (u32, u32) {
    let (asset_w, asset_h) = spec.asset.dimensions();
    let aspect = asset_h as f32 / asset_w as f32;

    let mut width = (host_w as f32 * spec.scale).round().max(1.0);
    let mut height = (width * aspect).round().max(1.0);

    let inner_w = host_w.saturating_sub(2 * margin).max(1) as f32;
    let inner_h = host_h.saturating_sub(2 * margin).max(1) as f32;
    let fit = (inner_w / width).min(inner_h / height);
    if fit < 1.0 {
        width = (width * fit).floor().max(1.0);
        height = (height * fit).floor().max(1.0);
    }

    (
        (width as u32).clamp(1, host_w),
        (height as u32).clamp(1, host_h),
    )
}

fn placement(anchor: Anchor, host: (u32, u32), mark: (u32, u32), margin: u32) -> (u32, u32) {
    let axis = |cell: u8, host: u32, mark: u32| {
        let free = host - mark;
        let pos = match cell {
            0 => margin,
            1 => free / 2,
            _ => free.saturating_sub(margin),
        };
        pos.min(free)
    };
    let (cx, cy) = anchor.cells();
    (axis(cx, host.0, mark.0), axis(cy, host.1, mark.1))
}

/// Porter-Duff "over" for a host pixel that carries its own alpha.
fn blend_over_rgba(host: &mut [u8], mark: [u8; 4], alpha: f32) {
    let host_a = f32::from(host[3]) / 255.0;
    let out_a = alpha + host_a * (1.0 - alpha);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let value = (f32::from(mark[c]) * alpha + f32::from(host[c]) * host_a * (1.0 - alpha)) / out_a;
        host[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    host[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
