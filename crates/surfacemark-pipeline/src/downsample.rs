//! Image resizing for the output encoder.
//!
//! Two operations: fit an image inside a maximum dimension (longest side
//! clamped, aspect ratio preserved) and shrink by a fixed factor. Both
//! use the `image` crate's resamplers.

use std::fmt;

use image::imageops;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, RgbaImage};

/// Resampling filter used when resizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    const fn to_image_filter(self) -> imageops::FilterType {
        match self {
            Self::Nearest => imageops::FilterType::Nearest,
            Self::Triangle => imageops::FilterType::Triangle,
            Self::CatmullRom => imageops::FilterType::CatmullRom,
            Self::Gaussian => imageops::FilterType::Gaussian,
            Self::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Dimensions after scaling both sides by `factor`.
///
/// Sides are floored so any factor below 1 makes progress on sides
/// longer than one pixel, and never drop below 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_dimensions(dims: Dimensions, factor: f64) -> Dimensions {
    let side = |v: u32| ((f64::from(v) * factor).floor() as u32).max(1);
    Dimensions::new(side(dims.width), side(dims.height))
}

/// Dimensions that fit inside `max_dimension` with the aspect ratio
/// preserved. The longer side becomes exactly `max_dimension`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fit_dimensions(dims: Dimensions, max_dimension: u32) -> Dimensions {
    let long = dims.longer_side();
    if long <= max_dimension {
        return dims;
    }
    let ratio = f64::from(max_dimension) / f64::from(long);
    let side = |v: u32| {
        if v == long {
            max_dimension
        } else {
            ((f64::from(v) * ratio).round() as u32).clamp(1, max_dimension)
        }
    };
    Dimensions::new(side(dims.width), side(dims.height))
}

/// Resize so the longest side is at most `max_dimension`.
///
/// Returns the (possibly unchanged) image and whether resizing was
/// actually applied.
#[must_use]
pub fn fit_within(
    image: &RgbaImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (RgbaImage, bool) {
    let dims = Dimensions::of(image);
    let target = fit_dimensions(dims, max_dimension);
    if target == dims {
        return (image.clone(), false);
    }
    (resize(image, target, filter), true)
}

/// Resize to exactly `target`.
#[must_use]
pub fn resize(image: &RgbaImage, target: Dimensions, filter: DownsampleFilter) -> RgbaImage {
    imageops::resize(image, target.width, target.height, filter.to_image_filter())
}
