//! Mapping between canvas space and pixel space.
//!
//! Canvas space is where the user interacts; pixel space is a concrete
//! raster buffer. Both put the origin at the top-left with y growing
//! downward, so the mapping is a pure per-axis scale.
//!
//! Every mapping returns `None` when the canvas size is empty, because
//! the ratio is undefined. Callers must handle that case before placing
//! any geometry.

use crate::types::{Dimensions, Point, Size};

/// Independent x/y ratios from canvas units to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    /// Pixels per canvas unit along x.
    pub x: f64,
    /// Pixels per canvas unit along y.
    pub y: f64,
}

impl ScaleFactor {
    /// Scale a canvas-space point into pixel space.
    #[must_use]
    pub fn apply(self, point: Point) -> Point {
        Point::new(point.x * self.x, point.y * self.y)
    }

    /// Scale a canvas-space length, such as a brush width.
    ///
    /// Uses the mean of the two axis ratios so the same stroke gets the
    /// same width wherever it is rasterized.
    #[must_use]
    pub fn apply_length(self, length: f64) -> f64 {
        length * (self.x + self.y) / 2.0
    }
}

/// Ratios mapping `canvas` onto a `pixels` buffer.
///
/// Returns `None` if `canvas` is empty.
#[must_use]
pub fn scale_factor(canvas: Size, pixels: Dimensions) -> Option<ScaleFactor> {
    if canvas.is_empty() {
        return None;
    }
    Some(ScaleFactor {
        x: f64::from(pixels.width) / canvas.width,
        y: f64::from(pixels.height) / canvas.height,
    })
}

/// Map a canvas-space point into pixel space.
///
/// Returns `None` if `canvas` is empty.
#[must_use]
pub fn to_pixel_space(point: Point, canvas: Size, pixels: Dimensions) -> Option<Point> {
    scale_factor(canvas, pixels).map(|s| s.apply(point))
}

/// Map a pixel-space point back into canvas space.
///
/// Returns `None` if `canvas` is empty or `pixels` has a zero side.
#[must_use]
pub fn to_canvas_space(point: Point, canvas: Size, pixels: Dimensions) -> Option<Point> {
    if canvas.is_empty() || pixels.is_empty() {
        return None;
    }
    Some(Point::new(
        point.x * canvas.width / f64::from(pixels.width),
        point.y * canvas.height / f64::from(pixels.height),
    ))
}

/// The current canvas size together with the buffer it maps onto.
///
/// Purely derived: rebuilt on every resize, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    canvas: Size,
    pixels: Dimensions,
    scale: ScaleFactor,
}

impl CanvasGeometry {
    /// Build a geometry, or `None` if `canvas` is empty.
    #[must_use]
    pub fn new(canvas: Size, pixels: Dimensions) -> Option<Self> {
        let scale = scale_factor(canvas, pixels)?;
        Some(Self {
            canvas,
            pixels,
            scale,
        })
    }

    /// The canvas size.
    #[must_use]
    pub const fn canvas(&self) -> Size {
        self.canvas
    }

    /// The target buffer size.
    #[must_use]
    pub const fn pixels(&self) -> Dimensions {
        self.pixels
    }

    /// Canvas-to-pixel ratios.
    #[must_use]
    pub const fn scale(&self) -> ScaleFactor {
        self.scale
    }

    /// Map a canvas-space point into pixel space.
    #[must_use]
    pub fn to_pixel(&self, point: Point) -> Point {
        self.scale.apply(point)
    }

    /// Map a pixel-space point into canvas space.
    #[must_use]
    pub fn to_canvas(&self, point: Point) -> Point {
        Point::new(point.x / self.scale.x, point.y / self.scale.y)
    }
}
