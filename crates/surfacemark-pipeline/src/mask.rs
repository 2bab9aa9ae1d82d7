//! Mask extraction: turn a class tensor into per-surface pixel masks.
//!
//! For each mapped [`SurfaceKind`] the class-id grid is scanned once and
//! the flat indices whose class belongs to that kind are collected. A
//! kind whose coverage falls below [`ExtractConfig::min_coverage`] is
//! dropped entirely, so a kind absent from the result means "not
//! detected", which is distinct from "detected with zero pixels".
//!
//! Extraction is a best-effort enrichment. A tensor whose shape is not
//! understood produces an empty list rather than an error.

use serde::{Deserialize, Serialize};

use crate::surface::{SurfaceClassMap, SurfaceKind, SurfaceMask};
use crate::tensor::{ClassGrid, ClassTensor};
use crate::types::MarkupError;

/// Parameters for mask extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Which class ids each surface kind covers.
    pub class_map: SurfaceClassMap,

    /// Minimum fraction of the grid (`0.0..=1.0`) a kind must cover to be
    /// reported. The boundary is inclusive.
    pub min_coverage: f64,
}

impl ExtractConfig {
    /// Default minimum coverage: 1% of the grid.
    pub const DEFAULT_MIN_COVERAGE: f64 = 0.01;

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidConfig`] if `min_coverage` is not
    /// within `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), MarkupError> {
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(MarkupError::InvalidConfig(format!(
                "min_coverage must be within 0..=1, got {}",
                self.min_coverage,
            )));
        }
        Ok(())
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            class_map: SurfaceClassMap::default(),
            min_coverage: Self::DEFAULT_MIN_COVERAGE,
        }
    }
}

/// Extract every surface kind meeting the coverage threshold.
///
/// Output order follows [`SurfaceKind`] enumeration order, not coverage.
///
/// Unsupported tensor shapes yield an empty list. This is intentional:
/// the absence of masks is a valid outcome and callers fall back to
/// manual drawing.
#[must_use = "returns the extracted surface masks"]
pub fn extract_surfaces(tensor: &ClassTensor, config: &ExtractConfig) -> Vec<SurfaceMask> {
    let Some(grid) = tensor.class_grid() else {
        tracing::warn!(shape = ?tensor.shape(), "unsupported class tensor shape, no surfaces extracted");
        return Vec::new();
    };
    extract_from_grid(&grid, config)
}

/// Extract surfaces from an already-reduced class grid.
#[must_use = "returns the extracted surface masks"]
pub fn extract_from_grid(grid: &ClassGrid, config: &ExtractConfig) -> Vec<SurfaceMask> {
    config
        .class_map
        .iter()
        .filter_map(|(kind, classes)| extract_kind(grid, kind, classes, config.min_coverage))
        .collect()
}

/// Extract a single kind, or `None` if it falls below `min_coverage`.
fn extract_kind(
    grid: &ClassGrid,
    kind: SurfaceKind,
    classes: &[u32],
    min_coverage: f64,
) -> Option<SurfaceMask> {
    let indices: Vec<usize> = grid
        .ids()
        .iter()
        .enumerate()
        .filter(|&(_, id)| classes.contains(id))
        .map(|(i, _)| i)
        .collect();

    let mask = SurfaceMask::from_sorted(kind, indices, grid.dimensions());
    if mask.coverage() < min_coverage {
        tracing::debug!(
            %kind,
            coverage = mask.coverage(),
            min_coverage,
            "surface below coverage threshold",
        );
        return None;
    }
    tracing::debug!(%kind, pixels = mask.len(), coverage = mask.coverage(), "surface extracted");
    Some(mask)
}
