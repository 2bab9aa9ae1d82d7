//! tiny-skia plumbing shared by the compositor and the diff engine.
//!
//! Both consumers rasterize the same stroke list with the same
//! paint/erase semantics; only the target buffer differs.

use std::borrow::Borrow;

use tiny_skia::{
    BlendMode, FillRule, IntSize, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap,
    Transform,
};

use crate::composite::MaskSampling;
use crate::geometry::ScaleFactor;
use crate::ledger::{Stroke, Tool};
use crate::surface::SurfaceMask;
use crate::types::{Dimensions, MarkupError, RgbaImage};

/// Allocate a transparent pixmap.
pub(crate) fn new_pixmap(dims: Dimensions) -> Result<Pixmap, MarkupError> {
    Pixmap::new(dims.width, dims.height).ok_or(MarkupError::Allocation {
        width: dims.width,
        height: dims.height,
    })
}

/// Copy a straight-alpha image into a premultiplied pixmap.
pub(crate) fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, MarkupError> {
    let (width, height) = image.dimensions();
    let alloc_err = MarkupError::Allocation { width, height };
    let size = IntSize::from_wh(width, height).ok_or(alloc_err)?;
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        if a < 255 {
            for c in &mut px[..3] {
                *c = premultiply(*c, a);
            }
        }
    }
    Pixmap::from_vec(data, size).ok_or(MarkupError::Allocation { width, height })
}

/// Copy a premultiplied pixmap out as a straight-alpha image.
pub(crate) fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut data = pixmap.data().to_vec();
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        match a {
            0 => px.copy_from_slice(&[0, 0, 0, 0]),
            255 => {}
            _ => {
                for c in &mut px[..3] {
                    *c = unpremultiply(*c, a);
                }
            }
        }
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .unwrap_or_else(|| RgbaImage::new(pixmap.width(), pixmap.height()))
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply(c: u8, a: u8) -> u8 {
    ((u16::from(c) * u16::from(a) + 127) / 255) as u8
}

#[allow(clippy::cast_possible_truncation)]
fn unpremultiply(c: u8, a: u8) -> u8 {
    let a = u16::from(a);
    ((u16::from(c) * 255 + a / 2) / a).min(255) as u8
}

/// Rasterize every stroke, in order, onto `pixmap`.
pub(crate) fn draw_strokes<S: Borrow<Stroke>>(pixmap: &mut Pixmap, strokes: &[S], scale: ScaleFactor) {
    for stroke in strokes {
        draw_stroke(pixmap, stroke.borrow(), scale);
    }
}

/// Rasterize one stroke.
///
/// Paint strokes blend their color source-over. Erase strokes clear
/// whatever is under them to full transparency. Strokes with fewer than
/// two points, or a non-finite or negative width, draw nothing.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn draw_stroke(pixmap: &mut Pixmap, stroke: &Stroke, scale: ScaleFactor) {
    let width = scale.apply_length(stroke.width());
    if !stroke.is_committable() || !width.is_finite() || width < 0.0 {
        return;
    }

    let mut paint = Paint::default();
    paint.anti_alias = true;
    match stroke.tool() {
        Tool::Paint => {
            let c = stroke.color();
            paint.set_color_rgba8(c.r, c.g, c.b, c.a);
        }
        Tool::Erase => {
            paint.set_color_rgba8(0, 0, 0, 255);
            paint.blend_mode = BlendMode::Clear;
        }
    }

    let points = stroke.points();
    let first = scale.apply(points[0]);

    // A tap that never moved still leaves a round dot.
    if points.iter().all(|&p| p == points[0]) {
        if let Some(dot) = PathBuilder::from_circle(first.x as f32, first.y as f32, (width / 2.0) as f32) {
            pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
        }
        return;
    }

    let Some(path) = stroke_path(points.iter().map(|&p| scale.apply(p))) else {
        return;
    };
    let style = tiny_skia::Stroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..tiny_skia::Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &style, Transform::identity(), None);
}

#[allow(clippy::cast_possible_truncation)]
fn stroke_path(mut points: impl Iterator<Item = crate::types::Point>) -> Option<Path> {
    let mut pb = PathBuilder::new();
    let first = points.next()?;
    pb.move_to(first.x as f32, first.y as f32);
    for p in points {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.finish()
}

/// Resample a surface mask onto a `target`-sized coverage stencil.
///
/// The mask grid is stretched to fill the target. Coverage is 255 inside
/// and 0 outside; bilinear sampling softens the boundary.
pub(crate) fn mask_stencil(
    surface: &SurfaceMask,
    target: Dimensions,
    sampling: MaskSampling,
) -> Result<Mask, MarkupError> {
    let mut stencil = Mask::new(target.width, target.height).ok_or(MarkupError::Allocation {
        width: target.width,
        height: target.height,
    })?;
    let source = surface.dimensions();
    if source.is_empty() || surface.is_empty() {
        return Ok(stencil);
    }

    let grid = surface.to_gray();
    let (sw, sh) = (source.width, source.height);
    let x_ratio = f64::from(sw) / f64::from(target.width);
    let y_ratio = f64::from(sh) / f64::from(target.height);
    let tw = target.width as usize;
    let data = stencil.data_mut();

    for ty in 0..target.height {
        let fy = (f64::from(ty) + 0.5) * y_ratio;
        for tx in 0..target.width {
            let fx = (f64::from(tx) + 0.5) * x_ratio;
            let value = match sampling {
                MaskSampling::Nearest => {
                    let x = clamp_index(fx.floor(), sw);
                    let y = clamp_index(fy.floor(), sh);
                    grid.get_pixel(x, y).0[0]
                }
                MaskSampling::Bilinear => bilinear(&grid, fx - 0.5, fy - 0.5),
            };
            data[ty as usize * tw + tx as usize] = value;
        }
    }
    Ok(stencil)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_index(v: f64, len: u32) -> u32 {
    (v.max(0.0) as u32).min(len - 1)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bilinear(grid: &image::GrayImage, fx: f64, fy: f64) -> u8 {
    let (w, h) = grid.dimensions();
    let fx = fx.clamp(0.0, f64::from(w - 1));
    let fy = fy.clamp(0.0, f64::from(h - 1));
    let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (tx, ty) = (fx - f64::from(x0), fy - f64::from(y0));
    let at = |x, y| f64::from(grid.get_pixel(x, y).0[0]);
    let top = at(x0, y0).mul_add(1.0 - tx, at(x1, y0) * tx);
    let bottom = at(x0, y1).mul_add(1.0 - tx, at(x1, y1) * tx);
    top.mul_add(1.0 - ty, bottom * ty).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::scale_factor;
    use crate::surface::SurfaceKind;
    use crate::types::{Color, Point, Size};

    fn identity() -> ScaleFactor {
        scale_factor(Size::new(10.0, 10.0), Dimensions::new(10, 10)).unwrap()
    }

    fn alpha_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).unwrap().alpha()
    }

    #[test]
    fn premultiply_round_trip_is_close() {
        for a in [1u8, 64, 128, 200, 254] {
            for c in [0u8, 17, 128, 255] {
                let back = unpremultiply(premultiply(c, a), a);
                let tolerance = 255 / a + 1;
                assert!(back.abs_diff(c) <= tolerance, "c={c} a={a} back={back}");
            }
        }
    }

    #[test]
    fn rgba_pixmap_round_trip_preserves_opaque_pixels() {
        let img = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8 * 50, y as u8 * 90, 7, 255]));
        let back = pixmap_to_rgba(&pixmap_from_rgba(&img).unwrap());
        assert_eq!(back, img);
    }

    #[test]
    fn new_pixmap_rejects_zero_size() {
        assert!(matches!(
            new_pixmap(Dimensions::new(0, 5)),
            Err(MarkupError::Allocation { width: 0, height: 5 })
        ));
    }

    #[test]
    fn paint_then_erase_clears() {
        let mut pixmap = new_pixmap(Dimensions::new(10, 10)).unwrap();
        let line = vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)];
        let paint = Stroke::new(line.clone(), Tool::Paint, 4.0, Color::NEUTRAL);
        let erase = Stroke::new(line, Tool::Erase, 6.0, Color::NEUTRAL);

        draw_stroke(&mut pixmap, &paint, identity());
        assert_eq!(alpha_at(&pixmap, 5, 5), 255);

        draw_stroke(&mut pixmap, &erase, identity());
        assert_eq!(alpha_at(&pixmap, 5, 5), 0);
    }

    #[test]
    fn single_point_stroke_draws_nothing() {
        let mut pixmap = new_pixmap(Dimensions::new(10, 10)).unwrap();
        let s = Stroke::new(vec![Point::new(5.0, 5.0)], Tool::Paint, 4.0, Color::NEUTRAL);
        draw_stroke(&mut pixmap, &s, identity());
        assert!(pixmap.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn stationary_stroke_leaves_dot() {
        let mut pixmap = new_pixmap(Dimensions::new(10, 10)).unwrap();
        let p = Point::new(5.0, 5.0);
        let s = Stroke::new(vec![p, p], Tool::Paint, 4.0, Color::NEUTRAL);
        draw_stroke(&mut pixmap, &s, identity());
        assert!(alpha_at(&pixmap, 5, 5) > 0);
        assert_eq!(alpha_at(&pixmap, 0, 0), 0);
    }

    #[test]
    fn stroke_width_scales_with_canvas() {
        // Canvas 10x10 onto 100x100: a 2-unit stroke is 20 px wide.
        let scale = scale_factor(Size::new(10.0, 10.0), Dimensions::new(100, 100)).unwrap();
        let mut pixmap = new_pixmap(Dimensions::new(100, 100)).unwrap();
        let s = Stroke::new(
            vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)],
            Tool::Paint,
            2.0,
            Color::NEUTRAL,
        );
        draw_stroke(&mut pixmap, &s, scale);
        assert_eq!(alpha_at(&pixmap, 50, 42), 255);
        assert_eq!(alpha_at(&pixmap, 50, 35), 0);
    }

    #[test]
    fn nearest_stencil_stretches_mask() {
        // Left column of a 2x2 grid.
        let surface = SurfaceMask::new(SurfaceKind::Wall, vec![0, 2], Dimensions::new(2, 2)).unwrap();
        let stencil = mask_stencil(&surface, Dimensions::new(8, 4), MaskSampling::Nearest).unwrap();
        let data = stencil.data();
        for y in 0..4 {
            for x in 0..8 {
                let expected = if x < 4 { 255 } else { 0 };
                assert_eq!(data[y * 8 + x], expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn bilinear_stencil_softens_edges_only() {
        let surface = SurfaceMask::new(SurfaceKind::Wall, vec![0, 2], Dimensions::new(2, 2)).unwrap();
        let stencil = mask_stencil(&surface, Dimensions::new(8, 2), MaskSampling::Bilinear).unwrap();
        let row = &stencil.data()[..8];
        assert_eq!(row[0], 255);
        assert_eq!(row[7], 0);
        assert!(row[3] > 0 && row[3] < 255);
        assert!(row.windows(2).all(|w| w[0] >= w[1]), "monotone falloff: {row:?}");
    }

    #[test]
    fn empty_mask_gives_blank_stencil() {
        let surface = SurfaceMask::new(SurfaceKind::Door, vec![], Dimensions::new(4, 4)).unwrap();
        let stencil = mask_stencil(&surface, Dimensions::new(3, 3), MaskSampling::Bilinear).unwrap();
        assert!(stencil.data().iter().all(|&v| v == 0));
    }
}
