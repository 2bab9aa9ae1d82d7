//! Shared types for the surfacemark markup pipeline.

use serde::{Deserialize, Serialize};

use crate::encode::EncodedImage;

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can pass photos and
/// composites without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point.
///
/// Used for both canvas-space coordinates (where the user drew) and
/// pixel-space coordinates (where a buffer is rasterized). Origin is the
/// top-left corner, y grows downward in both spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position from the left edge.
    pub x: f64,
    /// Vertical position from the top edge.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A continuous 2D extent, used for canvas sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in canvas units.
    pub width: f64,
    /// Height in canvas units.
    pub height: f64,
}

impl Size {
    /// A size with no area.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero, negative, or not finite.
    ///
    /// Canvas-to-pixel mapping is undefined for empty sizes.
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The longer of the two sides.
    #[must_use]
    pub fn longer_side(self) -> u32 {
        self.width.max(self.height)
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The same extent as a continuous [`Size`].
    #[must_use]
    pub fn to_size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

/// A straight (non-premultiplied) 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel, 255 is fully opaque.
    pub a: u8,
}

impl Color {
    /// Neutral light gray used for the mask highlight and the default brush.
    pub const NEUTRAL: Self = Self::opaque(190, 190, 190);

    /// Create a color from all four channels.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }
}

/// Errors that can occur in the markup pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// A pixel buffer of the requested size could not be allocated.
    #[error("failed to allocate a {width}x{height} pixel buffer")]
    Allocation {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Strokes need to be placed but the canvas size is empty, so the
    /// canvas-to-pixel mapping is undefined.
    #[error("canvas size is empty; strokes cannot be mapped to pixels")]
    EmptyCanvas,

    /// Tensor data does not match its declared shape.
    #[error("invalid class tensor: {0}")]
    InvalidTensor(String),

    /// Mask indices do not fit the mask grid.
    #[error("invalid surface mask: {0}")]
    InvalidMask(String),

    /// The image encoder failed.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// Every encode attempt exceeded the byte budget.
    ///
    /// Carries the final, most reduced attempt so callers may still use it.
    #[error("could not encode within {max_bytes} bytes (best attempt: {best_size} bytes)")]
    BudgetExceeded {
        /// The byte ceiling that could not be met.
        max_bytes: usize,
        /// Size of the final attempt in bytes.
        best_size: usize,
        /// The final attempt.
        best: Box<EncodedImage>,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
