//! Segmentation model output and its reduction to a class-id grid.
//!
//! A [`ClassTensor`] is whatever the inference engine hands back: either
//! raw per-class scores or a grid that has already been reduced to one
//! class id per pixel. [`ClassTensor::class_grid`] normalizes both into a
//! [`ClassGrid`].
//!
//! # Supported layouts
//!
//! | Rank | Shape | Meaning |
//! |------|-------|---------|
//! | 4 | `[N, C, H, W]` | raw scores, first batch item used |
//! | 3 | `[1, H, W]` | class ids |
//! | 3 | `[C, H, W]`, `C > 1` | raw scores |
//! | 2 | `[H, W]` | class ids |
//!
//! Anything else is unsupported and yields no grid.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, MarkupError};

/// Class id assigned to pixels whose id value is unusable (negative,
/// NaN, infinite). Matches no surface kind in practice.
pub const NO_CLASS: u32 = u32::MAX;

/// Dense model output: a shape and row-major `f32` data.
///
/// Owned by the caller and read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct ClassTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Unvalidated serde form of [`ClassTensor`].
#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl TryFrom<RawTensor> for ClassTensor {
    type Error = MarkupError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.data)
    }
}

/// How a tensor's data should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `classes` planes of `height * width` scores each.
    Scores {
        /// Number of class planes.
        classes: usize,
        /// Grid height.
        height: usize,
        /// Grid width.
        width: usize,
    },
    /// One class id per pixel, stored as `f32`.
    ClassIds {
        /// Grid height.
        height: usize,
        /// Grid width.
        width: usize,
    },
}

impl ClassTensor {
    /// Wrap model output.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidTensor`] if the product of `shape`
    /// overflows or differs from `data.len()`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, MarkupError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| MarkupError::InvalidTensor(format!("shape {shape:?} overflows")))?;
        if expected != data.len() {
            return Err(MarkupError::InvalidTensor(format!(
                "shape {shape:?} needs {expected} values, got {}",
                data.len(),
            )));
        }
        Ok(Self { shape, data })
    }

    /// The tensor shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The raw values.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Interpret the shape, or `None` if the rank is unsupported, any
    /// side is zero, or the batch is empty.
    #[must_use]
    pub fn layout(&self) -> Option<TensorLayout> {
        let layout = match *self.shape.as_slice() {
            [_, classes, height, width] => TensorLayout::Scores {
                classes,
                height,
                width,
            },
            [1, height, width] | [height, width] => TensorLayout::ClassIds { height, width },
            [classes, height, width] => TensorLayout::Scores {
                classes,
                height,
                width,
            },
            _ => return None,
        };
        let (height, width, classes) = match layout {
            TensorLayout::Scores {
                classes,
                height,
                width,
            } => (height, width, classes),
            TensorLayout::ClassIds { height, width } => (height, width, 1),
        };
        if height == 0 || width == 0 || classes == 0 {
            return None;
        }
        // An empty batch has a valid shape product but no data to read.
        let needed = classes.checked_mul(height)?.checked_mul(width)?;
        (needed <= self.data.len()).then_some(layout)
    }

    /// Reduce to one class id per pixel.
    ///
    /// Score tensors are reduced by a per-pixel argmax; class-id tensors are
    /// converted directly. Returns `None` for unsupported layouts and for
    /// grids whose sides do not fit in `u32`.
    #[must_use]
    pub fn class_grid(&self) -> Option<ClassGrid> {
        let layout = self.layout()?;
        match layout {
            TensorLayout::Scores {
                classes,
                height,
                width,
            } => {
                let dimensions = grid_dimensions(height, width)?;
                // Leading batch items beyond the first are ignored.
                let plane = height * width;
                let scores = &self.data[..classes * plane];
                Some(ClassGrid {
                    dimensions,
                    ids: argmax(scores, classes, height, width),
                })
            }
            TensorLayout::ClassIds { height, width } => {
                let dimensions = grid_dimensions(height, width)?;
                let ids = self.data[..height * width]
                    .iter()
                    .copied()
                    .map(id_from_value)
                    .collect();
                Some(ClassGrid { dimensions, ids })
            }
        }
    }
}

fn grid_dimensions(height: usize, width: usize) -> Option<Dimensions> {
    Some(Dimensions::new(
        u32::try_from(width).ok()?,
        u32::try_from(height).ok()?,
    ))
}

/// Convert a stored class-id value, mapping unusable values to [`NO_CLASS`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn id_from_value(v: f32) -> u32 {
    if v.is_finite() && v >= 0.0 {
        v as u32
    } else {
        NO_CLASS
    }
}

/// One class id per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassGrid {
    dimensions: Dimensions,
    ids: Vec<u32>,
}

impl ClassGrid {
    /// Grid size.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Class ids, row-major.
    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the grid has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-pixel argmax over `classes` score planes.
///
/// `scores` holds `classes` consecutive planes of `height * width`
/// values. Rows are reduced in parallel; each row writes only its own
/// slice of the output. Ties go to the lowest class id because only a
/// strictly greater score replaces the running best, and NaN never
/// does.
///
/// `scores` must hold at least `classes * height * width` values;
/// [`ClassTensor::layout`] guarantees this for its callers.
pub(crate) fn argmax(scores: &[f32], classes: usize, height: usize, width: usize) -> Vec<u32> {
    let plane = height * width;
    let mut ids = vec![0u32; plane];
    if plane == 0 {
        return ids;
    }
    ids.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let base = row * width;
            for (col, slot) in out.iter_mut().enumerate() {
                let px = base + col;
                let mut best = f32::NEG_INFINITY;
                let mut best_class = 0u32;
                for (class, &v) in (0u32..).zip(scores[px..].iter().step_by(plane).take(classes)) {
                    if v > best {
                        best = v;
                        best_class = class;
                    }
                }
                *slot = best_class;
            }
        });
    ids
}
