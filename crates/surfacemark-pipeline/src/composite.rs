//! Compositing: flatten a photo, an optional surface highlight, and the
//! stroke list into one image.
//!
//! Rendering uses two layers:
//!
//! 1. **Base**: a copy of the photo at its native resolution.
//! 2. **Overlay**: a transparent layer holding the mask highlight and
//!    every committed stroke, in commit order.
//!
//! Erase strokes clear the overlay only, so they reveal the photo rather
//! than punching holes in it. The overlay is flattened onto the base
//! exactly once, source-over.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tiny_skia::{Pixmap, PixmapPaint, Rect, Transform};

use crate::geometry::scale_factor;
use crate::ledger::Stroke;
use crate::raster;
use crate::surface::SurfaceMask;
use crate::types::{Color, Dimensions, MarkupError, RgbaImage, Size};

/// How a surface mask grid is resampled onto a larger target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskSampling {
    /// Hard, blocky mask edges.
    Nearest,
    /// Smoothly interpolated mask edges.
    #[default]
    Bilinear,
}

impl fmt::Display for MaskSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Bilinear => f.write_str("Bilinear"),
        }
    }
}

/// Visual parameters for compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeStyle {
    /// Fill color for the accepted surface mask.
    pub highlight: Color,
    /// Resampling used to stretch the mask over the photo.
    pub mask_sampling: MaskSampling,
}

impl CompositeStyle {
    /// Default highlight: opaque neutral gray.
    pub const DEFAULT_HIGHLIGHT: Color = Color::NEUTRAL;
}

impl Default for CompositeStyle {
    fn default() -> Self {
        Self {
            highlight: Self::DEFAULT_HIGHLIGHT,
            mask_sampling: MaskSampling::default(),
        }
    }
}

/// Render the markup layer alone, at `target` resolution.
///
/// # Errors
///
/// Returns [`MarkupError::EmptyCanvas`] if there are strokes to place
/// but `canvas` is empty, or [`MarkupError::Allocation`] if a buffer
/// cannot be created.
pub fn render_overlay<S: Borrow<Stroke>>(
    surface: Option<&SurfaceMask>,
    strokes: &[S],
    canvas: Size,
    target: Dimensions,
    style: &CompositeStyle,
) -> Result<RgbaImage, MarkupError> {
    let overlay = overlay_pixmap(surface, strokes, canvas, target, style)?;
    Ok(raster::pixmap_to_rgba(&overlay))
}

fn overlay_pixmap<S: Borrow<Stroke>>(
    surface: Option<&SurfaceMask>,
    strokes: &[S],
    canvas: Size,
    target: Dimensions,
    style: &CompositeStyle,
) -> Result<Pixmap, MarkupError> {
    let mut overlay = raster::new_pixmap(target)?;
    if let Some(surface) = surface {
        fill_highlight(&mut overlay, surface, target, style)?;
    }
    if !strokes.is_empty() {
        let scale = scale_factor(canvas, target).ok_or(MarkupError::EmptyCanvas)?;
        raster::draw_strokes(&mut overlay, strokes, scale);
    }
    Ok(overlay)
}

#[allow(clippy::cast_precision_loss)]
fn fill_highlight(
    overlay: &mut Pixmap,
    surface: &SurfaceMask,
    target: Dimensions,
    style: &CompositeStyle,
) -> Result<(), MarkupError> {
    let stencil = raster::mask_stencil(surface, target, style.mask_sampling)?;
    let Some(rect) = Rect::from_xywh(0.0, 0.0, overlay.width() as f32, overlay.height() as f32)
    else {
        return Ok(());
    };
    let mut paint = tiny_skia::Paint::default();
    let c = style.highlight;
    paint.set_color_rgba8(c.r, c.g, c.b, c.a);
    overlay.fill_rect(rect, &paint, Transform::identity(), Some(&stencil));
    Ok(())
}

/// Flatten `photo`, the optional surface highlight, and `strokes` into
/// one image the size of `photo`.
///
/// Strokes are in canvas coordinates and are scaled onto the photo.
/// Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns [`MarkupError::EmptyCanvas`] if there are strokes but
/// `canvas` is empty, or [`MarkupError::Allocation`] if `photo` has a
/// zero side or a buffer cannot be created.
pub fn composite<S: Borrow<Stroke>>(
    photo: &RgbaImage,
    surface: Option<&SurfaceMask>,
    strokes: &[S],
    canvas: Size,
    style: &CompositeStyle,
) -> Result<RgbaImage, MarkupError> {
    let target = Dimensions::of(photo);
    let mut base = raster::pixmap_from_rgba(photo)?;
    let overlay = overlay_pixmap(surface, strokes, canvas, target, style)?;
    base.draw_pixmap(
        0,
        0,
        overlay.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    tracing::debug!(
        width = target.width,
        height = target.height,
        strokes = strokes.len(),
        masked = surface.is_some(),
        "composited markup",
    );
    Ok(raster::pixmap_to_rgba(&base))
}

/// Render just the highlighted surface over transparency.
///
/// Used to preview a detected mask before the user accepts it.
///
/// # Errors
///
/// Returns [`MarkupError::Allocation`] if `target` has a zero side.
pub fn render_mask_highlight(
    surface: &SurfaceMask,
    target: Dimensions,
    style: &CompositeStyle,
) -> Result<RgbaImage, MarkupError> {
    let mut overlay = raster::new_pixmap(target)?;
    fill_highlight(&mut overlay, surface, target, style)?;
    Ok(raster::pixmap_to_rgba(&overlay))
}
