//! Has-markup detection.
//!
//! Answers one question: would the composite differ visibly from the bare
//! photo? A paint stroke later erased, or a mask fully erased, counts as
//! no markup.
//!
//! The check replays the markup into a scratch buffer and scans its
//! alpha channel. tiny-skia only rasterizes RGBA, so the scratch buffer
//! is RGBA and only alpha is inspected. The buffer matches the mask grid
//! when a mask is accepted, otherwise a fixed working resolution, so the
//! answer never depends on the photo's size.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::geometry::scale_factor;
use crate::ledger::Stroke;
use crate::raster;
use crate::surface::SurfaceMask;
use crate::types::{Dimensions, MarkupError, Size};

/// Parameters for has-markup detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Scratch buffer size used when no mask is accepted.
    pub working_resolution: Dimensions,

    /// Alpha values at or below this are treated as antialiasing
    /// residue, not markup.
    pub noise_threshold: u8,
}

impl DiffConfig {
    /// Default scratch resolution without a mask.
    pub const DEFAULT_WORKING_RESOLUTION: Dimensions = Dimensions::new(512, 512);

    /// Default noise threshold (about 5% alpha).
    pub const DEFAULT_NOISE_THRESHOLD: u8 = 13;

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidConfig`] if `working_resolution` has
    /// a zero side.
    pub fn validate(&self) -> Result<(), MarkupError> {
        if self.working_resolution.is_empty() {
            return Err(MarkupError::InvalidConfig(format!(
                "working_resolution must be non-empty, got {}x{}",
                self.working_resolution.width, self.working_resolution.height,
            )));
        }
        Ok(())
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            noise_threshold: Self::DEFAULT_NOISE_THRESHOLD,
        }
    }
}

/// Returns `true` if the accepted mask plus `strokes` leave any visible
/// markup.
///
/// # Errors
///
/// Returns [`MarkupError::EmptyCanvas`] if there are strokes but
/// `canvas` is empty, or [`MarkupError::Allocation`] if the scratch
/// buffer cannot be created.
pub fn has_markup<S: Borrow<Stroke>>(
    surface: Option<&SurfaceMask>,
    strokes: &[S],
    canvas: Size,
    config: &DiffConfig,
) -> Result<bool, MarkupError> {
    let surface = surface.filter(|s| !s.dimensions().is_empty());
    if strokes.is_empty() {
        return Ok(surface.is_some_and(|s| !s.is_empty()));
    }

    let dims = surface.map_or(config.working_resolution, SurfaceMask::dimensions);
    let scale = scale_factor(canvas, dims).ok_or(MarkupError::EmptyCanvas)?;
    let mut scratch = raster::new_pixmap(dims)?;

    if let Some(surface) = surface {
        let data = scratch.data_mut();
        for &i in surface.indices() {
            data[i * 4..i * 4 + 4].copy_from_slice(&[255; 4]);
        }
    }
    raster::draw_strokes(&mut scratch, strokes, scale);

    let visible = scratch
        .data()
        .chunks_exact(4)
        .any(|px| px[3] > config.noise_threshold);
    tracing::trace!(
        width = dims.width,
        height = dims.height,
        strokes = strokes.len(),
        visible,
        "markup diff",
    );
    Ok(visible)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ledger::Tool;
    use crate::surface::SurfaceKind;
    use crate::types::{Color, Point};

    const CANVAS: Size = Size::new(100.0, 100.0);

    fn stroke(tool: Tool, width: f64) -> Arc<Stroke> {
        Arc::new(Stroke::new(
            vec![Point::new(10.0, 50.0), Point::new(90.0, 50.0)],
            tool,
            width,
            Color::NEUTRAL,
        ))
    }

    fn none() -> [Arc<Stroke>; 0] {
        []
    }

    fn full_mask() -> SurfaceMask {
        SurfaceMask::new(SurfaceKind::Wall, (0..64).collect(), Dimensions::new(8, 8)).unwrap()
    }

    #[test]
    fn nothing_is_no_markup() {
        assert!(!has_markup(None, &none(), CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn mask_alone_is_markup() {
        let mask = full_mask();
        assert!(has_markup(Some(&mask), &none(), Size::ZERO, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn empty_mask_alone_is_not_markup() {
        let mask = SurfaceMask::new(SurfaceKind::Wall, vec![], Dimensions::new(8, 8)).unwrap();
        assert!(!has_markup(Some(&mask), &none(), CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn paint_is_markup() {
        let strokes = [stroke(Tool::Paint, 10.0)];
        assert!(has_markup(None, &strokes, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn paint_fully_erased_is_not_markup() {
        let strokes = [stroke(Tool::Paint, 10.0), stroke(Tool::Erase, 20.0)];
        assert!(!has_markup(None, &strokes, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn erase_alone_is_not_markup() {
        let strokes = [stroke(Tool::Erase, 20.0)];
        assert!(!has_markup(None, &strokes, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn mask_fully_erased_is_not_markup() {
        // One erase stroke far wider than the 8x8 grid wipes everything.
        let mask = full_mask();
        let wipe = [Arc::new(Stroke::new(
            vec![Point::new(0.0, 50.0), Point::new(100.0, 50.0)],
            Tool::Erase,
            300.0,
            Color::NEUTRAL,
        ))];
        assert!(!has_markup(Some(&mask), &wipe, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn mask_partly_erased_is_markup() {
        let mask = full_mask();
        let strokes = [stroke(Tool::Erase, 20.0)];
        assert!(has_markup(Some(&mask), &strokes, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn faint_paint_under_threshold_is_not_markup() {
        let faint = [Arc::new(Stroke::new(
            vec![Point::new(10.0, 50.0), Point::new(90.0, 50.0)],
            Tool::Paint,
            10.0,
            Color::rgba(190, 190, 190, 5),
        ))];
        assert!(!has_markup(None, &faint, CANVAS, &DiffConfig::default()).unwrap());
    }

    #[test]
    fn strokes_need_canvas_size() {
        let strokes = [stroke(Tool::Paint, 10.0)];
        let result = has_markup(None, &strokes, Size::ZERO, &DiffConfig::default());
        assert!(matches!(result, Err(MarkupError::EmptyCanvas)));
    }

    #[test]
    fn validate_rejects_empty_resolution() {
        let config = DiffConfig {
            working_resolution: Dimensions::new(0, 512),
            ..DiffConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(DiffConfig::default().validate().is_ok());
    }
}
