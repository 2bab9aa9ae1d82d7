//! Budgeted JPEG encoding.
//!
//! The composite must fit a byte ceiling and a pixel ceiling. The
//! encoder walks a fixed ladder until an attempt fits:
//!
//! 1. Fit the image inside [`EncodeBudget::max_dimension`].
//! 2. Encode at [`EncodeBudget::initial_quality`].
//! 3. Re-encode at each step of [`EncodeBudget::quality_ladder`].
//! 4. Shrink by [`EncodeBudget::shrink_factor`] and encode at
//!    [`EncodeBudget::shrink_quality`], repeatedly.
//!
//! Step 4 stops at [`EncodeBudget::min_dimension`] or after
//! [`EncodeBudget::max_shrink_steps`]; if nothing fit by then the call
//! fails with [`MarkupError::BudgetExceeded`], which still carries the
//! final attempt. The walk is deterministic: the same input always
//! produces the same bytes.

use std::fmt;

use image::ImageEncoder;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use crate::downsample::{self, DownsampleFilter};
use crate::types::{Dimensions, MarkupError, RgbaImage};

/// Size limits and the quality ladder for [`encode_within_budget`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeBudget {
    /// Maximum encoded size in bytes.
    pub max_bytes: usize,
    /// Maximum length of the longer side in pixels.
    pub max_dimension: u32,
    /// JPEG quality (1-100) of the first attempt.
    pub initial_quality: u8,
    /// Qualities tried in order after the first attempt.
    pub quality_ladder: Vec<u8>,
    /// Per-step scale applied while shrinking (`0.0 < f < 1.0`).
    pub shrink_factor: f64,
    /// JPEG quality used for every shrink attempt.
    pub shrink_quality: u8,
    /// Shrinking stops before the longer side drops below this.
    pub min_dimension: u32,
    /// Upper bound on shrink attempts.
    pub max_shrink_steps: u32,
    /// Resampling filter for every resize.
    pub resize_filter: DownsampleFilter,
}

impl EncodeBudget {
    /// Default byte ceiling: 10 MiB.
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;
    /// Default pixel ceiling for the longer side.
    pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
    /// Default quality of the first attempt.
    pub const DEFAULT_INITIAL_QUALITY: u8 = 90;
    /// Default quality ladder.
    pub const DEFAULT_QUALITY_LADDER: [u8; 8] = [80, 70, 60, 50, 40, 30, 20, 10];
    /// Default shrink factor.
    pub const DEFAULT_SHRINK_FACTOR: f64 = 0.9;
    /// Default quality while shrinking.
    pub const DEFAULT_SHRINK_QUALITY: u8 = 70;
    /// Default floor for the longer side while shrinking.
    pub const DEFAULT_MIN_DIMENSION: u32 = 16;
    /// Default cap on shrink attempts.
    pub const DEFAULT_MAX_SHRINK_STEPS: u32 = 64;
    /// Default resampling filter for shrinking.
    pub const DEFAULT_RESIZE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), MarkupError> {
        let invalid = |msg: String| Err(MarkupError::InvalidConfig(msg));
        if self.max_bytes == 0 {
            return invalid("max_bytes must be positive".to_string());
        }
        if self.max_dimension == 0 {
            return invalid("max_dimension must be positive".to_string());
        }
        if self.min_dimension == 0 {
            return invalid("min_dimension must be positive".to_string());
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return invalid(format!(
                "shrink_factor must be within (0, 1), got {}",
                self.shrink_factor,
            ));
        }
        let qualities = std::iter::once(self.initial_quality)
            .chain(self.quality_ladder.iter().copied())
            .chain(std::iter::once(self.shrink_quality));
        for q in qualities {
            if !(1..=100).contains(&q) {
                return invalid(format!("JPEG quality must be within 1..=100, got {q}"));
            }
        }
        Ok(())
    }
}

impl Default for EncodeBudget {
    fn default() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            initial_quality: Self::DEFAULT_INITIAL_QUALITY,
            quality_ladder: Self::DEFAULT_QUALITY_LADDER.to_vec(),
            shrink_factor: Self::DEFAULT_SHRINK_FACTOR,
            shrink_quality: Self::DEFAULT_SHRINK_QUALITY,
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            max_shrink_steps: Self::DEFAULT_MAX_SHRINK_STEPS,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
        }
    }
}

/// One encode attempt, recorded for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeAttempt {
    /// JPEG quality used.
    pub quality: u8,
    /// Pixel size encoded.
    pub dimensions: Dimensions,
    /// Resulting size in bytes.
    pub bytes: usize,
}

/// An encoded image plus the pixels it was encoded from.
#[derive(Clone)]
pub struct EncodedImage {
    image: RgbaImage,
    bytes: Vec<u8>,
    quality: u8,
    attempts: Vec<EncodeAttempt>,
}

impl EncodedImage {
    /// The pixels that were encoded (after any resizing).
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The JPEG bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the JPEG bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Consume and return the pixels and the JPEG bytes.
    #[must_use]
    pub fn into_parts(self) -> (RgbaImage, Vec<u8>) {
        (self.image, self.bytes)
    }

    /// Pixel size of the encoded image.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.image)
    }

    /// JPEG quality of the kept attempt.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }

    /// Every attempt made, in order; the last one is the kept one.
    #[must_use]
    pub fn attempts(&self) -> &[EncodeAttempt] {
        &self.attempts
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self.dimensions();
        f.debug_struct("EncodedImage")
            .field("dimensions", &format_args!("{}x{}", dims.width, dims.height))
            .field("bytes", &self.bytes.len())
            .field("quality", &self.quality)
            .field("attempts", &self.attempts.len())
            .finish()
    }
}

/// Encode `image` as baseline JPEG at `quality`.
///
/// Alpha is dropped; callers encode opaque composites.
///
/// # Errors
///
/// Returns [`MarkupError::ImageEncode`] if the encoder fails.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, MarkupError> {
    let rgb: image::RgbImage = image.convert();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Encode `image` so the result fits `budget`.
///
/// # Errors
///
/// - [`MarkupError::InvalidConfig`] if `budget` is invalid.
/// - [`MarkupError::Allocation`] if `image` has a zero side.
/// - [`MarkupError::ImageEncode`] if the JPEG encoder fails.
/// - [`MarkupError::BudgetExceeded`] if no attempt fits; the error
///   carries the final, most reduced attempt.
pub fn encode_within_budget(
    image: &RgbaImage,
    budget: &EncodeBudget,
) -> Result<EncodedImage, MarkupError> {
    budget.validate()?;
    let source = Dimensions::of(image);
    if source.is_empty() {
        return Err(MarkupError::Allocation {
            width: source.width,
            height: source.height,
        });
    }

    let (mut current, resized) = downsample::fit_within(image, budget.max_dimension, budget.resize_filter);
    if resized {
        let dims = Dimensions::of(&current);
        tracing::debug!(
            from = %format_args!("{}x{}", source.width, source.height),
            to = %format_args!("{}x{}", dims.width, dims.height),
            "clamped to max dimension",
        );
    }

    let mut walk = Walk {
        max_bytes: budget.max_bytes,
        attempts: Vec::new(),
    };

    let mut bytes = walk.attempt(&current, budget.initial_quality)?;
    let mut quality = budget.initial_quality;
    if walk.fits(&bytes) {
        return Ok(walk.finish(current, bytes, quality));
    }

    for &q in &budget.quality_ladder {
        bytes = walk.attempt(&current, q)?;
        quality = q;
        if walk.fits(&bytes) {
            return Ok(walk.finish(current, bytes, quality));
        }
    }

    for _ in 0..budget.max_shrink_steps {
        let next = downsample::scaled_dimensions(Dimensions::of(&current), budget.shrink_factor);
        if next.longer_side() < budget.min_dimension || next == Dimensions::of(&current) {
            break;
        }
        current = downsample::resize(&current, next, budget.resize_filter);
        bytes = walk.attempt(&current, budget.shrink_quality)?;
        quality = budget.shrink_quality;
        if walk.fits(&bytes) {
            return Ok(walk.finish(current, bytes, quality));
        }
    }

    let best_size = bytes.len();
    tracing::debug!(
        max_bytes = budget.max_bytes,
        best_size,
        attempts = walk.attempts.len(),
        "encode budget exhausted",
    );
    Err(MarkupError::BudgetExceeded {
        max_bytes: budget.max_bytes,
        best_size,
        best: Box::new(walk.finish(current, bytes, quality)),
    })
}

/// Bookkeeping for one run of the encode ladder.
struct Walk {
    max_bytes: usize,
    attempts: Vec<EncodeAttempt>,
}

impl Walk {
    fn attempt(&mut self, image: &RgbaImage, quality: u8) -> Result<Vec<u8>, MarkupError> {
        let bytes = encode_jpeg(image, quality)?;
        let attempt = EncodeAttempt {
            quality,
            dimensions: Dimensions::of(image),
            bytes: bytes.len(),
        };
        tracing::trace!(
            quality,
            width = attempt.dimensions.width,
            height = attempt.dimensions.height,
            bytes = attempt.bytes,
            "encode attempt",
        );
        self.attempts.push(attempt);
        Ok(bytes)
    }

    const fn fits(&self, bytes: &[u8]) -> bool {
        bytes.len() <= self.max_bytes
    }

    fn finish(self, image: RgbaImage, bytes: Vec<u8>, quality: u8) -> EncodedImage {
        EncodedImage {
            image,
            bytes,
            quality,
            attempts: self.attempts,
        }
    }
}
