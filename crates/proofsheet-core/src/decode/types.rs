//! Core types for decoded pixel data.

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::ColorSpace;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The byte stream is empty or not a recognized container.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel data length doesn't match the declared dimensions and layout.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality, alias-free on downscale).
    #[default]
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Flip horizontal + rotate 270 CW.
    Transpose = 5,
    Rotate90CW = 6,
    /// Flip horizontal + rotate 90 CW.
    Transverse = 7,
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Channel layout of an [`Image`]. Every layout stores 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    Rgb,
    Rgba,
}

impl ChannelLayout {
    /// Number of interleaved channels per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, ChannelLayout::Rgba)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PixelBuffer {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// An in-memory raster moving through the export pipeline.
///
/// Dimensions are always at least 1x1: every constructor rejects empty
/// buffers, so downstream stages never have to re-check. The color space tag
/// describes how the stored values should be interpreted; it changes only
/// through [`crate::color::convert`].
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    buffer: PixelBuffer,
    color_space: ColorSpace,
}

impl Image {
    /// Create an sRGB image from raw interleaved pixel data.
    pub fn new(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }

        let expected = (width as usize) * (height as usize) * layout.channels();
        if pixels.len() != expected {
            return Err(DecodeError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }

        let invalid = || DecodeError::InvalidPixelData {
            expected,
            actual: expected,
        };
        let buffer = match layout {
            ChannelLayout::Rgb => {
                PixelBuffer::Rgb(RgbImage::from_raw(width, height, pixels).ok_or_else(invalid)?)
            }
            ChannelLayout::Rgba => {
                PixelBuffer::Rgba(RgbaImage::from_raw(width, height, pixels).ok_or_else(invalid)?)
            }
        };

        Ok(Self {
            buffer,
            color_space: ColorSpace::Srgb,
        })
    }

    /// Create an sRGB image from an `image::RgbImage`.
    pub fn from_rgb_image(img: RgbImage) -> Result<Self, DecodeError> {
        check_dimensions(img.width(), img.height())?;
        Ok(Self {
            buffer: PixelBuffer::Rgb(img),
            color_space: ColorSpace::Srgb,
        })
    }

    /// Create an sRGB image from an `image::RgbaImage`.
    pub fn from_rgba_image(img: RgbaImage) -> Result<Self, DecodeError> {
        check_dimensions(img.width(), img.height())?;
        Ok(Self {
            buffer: PixelBuffer::Rgba(img),
            color_space: ColorSpace::Srgb,
        })
    }

    /// Normalize any decoded image to 8-bit RGB, or RGBA when the source
    /// carries an alpha channel.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self, DecodeError> {
        if img.color().has_alpha() {
            Self::from_rgba_image(img.into_rgba8())
        } else {
            Self::from_rgb_image(img.into_rgb8())
        }
    }

    /// Re-tag the image without touching pixel values.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub(crate) fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space;
    }

    pub fn width(&self) -> u32 {
        match &self.buffer {
            PixelBuffer::Rgb(img) => img.width(),
            PixelBuffer::Rgba(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.buffer {
            PixelBuffer::Rgb(img) => img.height(),
            PixelBuffer::Rgba(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Total number of pixels, widened so budgets never overflow.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn layout(&self) -> ChannelLayout {
        match &self.buffer {
            PixelBuffer::Rgb(_) => ChannelLayout::Rgb,
            PixelBuffer::Rgba(_) => ChannelLayout::Rgba,
        }
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Bits stored per channel.
    pub fn bit_depth(&self) -> u8 {
        8
    }

    /// Interleaved pixel data in row-major order.
    pub fn pixels(&self) -> &[u8] {
        match &self.buffer {
            PixelBuffer::Rgb(img) => img.as_raw().as_slice(),
            PixelBuffer::Rgba(img) => img.as_raw().as_slice(),
        }
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            PixelBuffer::Rgb(img) => &mut **img,
            PixelBuffer::Rgba(img) => &mut **img,
        }
    }

    /// Resample to exact dimensions, keeping layout and color space.
    pub(crate) fn resampled(&self, width: u32, height: u32, filter: FilterType) -> Self {
        let filter = filter.to_image_filter();
        let buffer = match &self.buffer {
            PixelBuffer::Rgb(img) => {
                PixelBuffer::Rgb(image::imageops::resize(img, width, height, filter))
            }
            PixelBuffer::Rgba(img) => {
                PixelBuffer::Rgba(image::imageops::resize(img, width, height, filter))
            }
        };
        Self {
            buffer,
            color_space: self.color_space,
        }
    }

    /// Borrow as an RGBA buffer when the image carries alpha.
    pub(crate) fn as_rgba(&self) -> Option<&RgbaImage> {
        match &self.buffer {
            PixelBuffer::Rgba(img) => Some(img),
            PixelBuffer::Rgb(_) => None,
        }
    }

    /// Borrow as an RGB buffer when the image is opaque.
    pub(crate) fn as_rgb(&self) -> Option<&RgbImage> {
        match &self.buffer {
            PixelBuffer::Rgb(img) => Some(img),
            PixelBuffer::Rgba(_) => None,
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), DecodeError> {
    if width == 0 || height == 0 {
        Err(DecodeError::InvalidDimensions { width, height })
    } else {
        Ok(())
    }
}
