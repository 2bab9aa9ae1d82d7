//! Integration tests: end-to-end markup scenarios through the public
//! session and pipeline APIs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use surfacemark_pipeline::{
    ClassTensor, Color, Dimensions, EncodeBudget, ExtractConfig, MarkupError, NullClock, Point,
    RgbaImage, Size, SurfaceClassMap, SurfaceKind, SurfaceMask, Tool, encode_within_budget,
    extract_surfaces,
};
use surfacemark_session::{MarkupSession, Segmenter, SessionConfig, StaticSegmenter};

const CANVAS: Size = Size::new(200.0, 150.0);

fn photo() -> RgbaImage {
    RgbaImage::from_fn(160, 120, |x, y| {
        let r = u8::try_from(x % 256).unwrap();
        let g = u8::try_from(y % 256).unwrap();
        image::Rgba([r, g, 90, 255])
    })
}

fn session() -> MarkupSession {
    let mut s = MarkupSession::new(SessionConfig::default()).unwrap();
    s.set_canvas_size(CANVAS);
    s
}

fn full_mask(kind: SurfaceKind) -> SurfaceMask {
    SurfaceMask::new(kind, (0..64).collect(), Dimensions::new(8, 8)).unwrap()
}

#[test]
fn checkerboard_tensor_yields_half_coverage_mask() {
    let data = (0..16u8)
        .map(|i| f32::from((i % 4 + i / 4) % 2))
        .collect();
    let tensor = ClassTensor::new(vec![4, 4], data).unwrap();
    let config = ExtractConfig {
        class_map: SurfaceClassMap::empty().with(SurfaceKind::Wall, [0]),
        min_coverage: 0.3,
    };
    let masks = extract_surfaces(&tensor, &config);
    assert_eq!(masks.len(), 1);
    assert_eq!(masks[0].len(), 8);
    assert!((masks[0].coverage() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn score_reduction_is_deterministic() {
    let (classes, h, w) = (6usize, 31usize, 29usize);
    let data: Vec<f32> = (0..classes * h * w)
        .map(|i| f32::from(u16::try_from(i * 37 % 11).unwrap()))
        .collect();
    let tensor = ClassTensor::new(vec![1, classes, h, w], data).unwrap();
    let a = tensor.class_grid().unwrap();
    let b = tensor.class_grid().unwrap();
    assert_eq!(a, b);
}

#[test]
fn ledger_flags_track_every_operation() {
    let mut s = session();
    let script = ["draw", "draw", "undo", "redo", "undo", "undo", "undo", "draw", "redo", "undo"];
    for (i, op) in script.iter().enumerate() {
        let y = 10.0 + f64::from(u32::try_from(i).unwrap()) * 10.0;
        match *op {
            "draw" => {
                s.draw(vec![Point::new(0.0, y), Point::new(50.0, y)]).unwrap();
                assert!(!s.can_redo(), "commit clears redo");
            }
            "undo" => {
                s.undo();
            }
            _ => {
                s.redo();
            }
        }
        assert_eq!(s.can_undo(), !s.strokes().is_empty());
    }
}

#[test]
fn commit_after_undo_makes_redo_a_noop() {
    let mut s = session();
    s.draw(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
    s.undo();
    s.draw(vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)]);
    assert!(!s.redo());
    assert_eq!(s.strokes().len(), 1);
}

#[test]
fn fully_erased_mask_is_not_markup() {
    let mut s = session();
    s.accept_detected_mask(full_mask(SurfaceKind::Wall));
    s.settle().unwrap();
    assert!(s.has_markup());

    // One eraser stroke far wider than the canvas covers the whole mask.
    s.add_stroke(
        vec![Point::new(0.0, 75.0), Point::new(200.0, 75.0)],
        Tool::Erase,
        1000.0,
        Color::NEUTRAL,
    )
    .unwrap();
    s.settle().unwrap();
    assert!(!s.has_markup());

    s.undo();
    s.settle().unwrap();
    assert!(s.has_markup(), "undoing the erase restores the mask");
}

#[test]
fn paint_then_erase_over_it_is_not_markup() {
    let mut s = session();
    s.draw(vec![Point::new(20.0, 70.0), Point::new(180.0, 70.0)]);
    s.select_tool(Tool::Erase);
    s.set_brush_width(120.0);
    s.draw(vec![Point::new(20.0, 70.0), Point::new(180.0, 70.0)]);
    s.settle().unwrap();
    assert!(!s.has_markup());
}

#[test]
fn finalize_twice_is_byte_identical() {
    let mut s = session();
    let floor =
        SurfaceMask::new(SurfaceKind::Floor, (32..64).collect(), Dimensions::new(8, 8)).unwrap();
    s.accept_detected_mask(floor);
    s.draw(vec![
        Point::new(10.0, 10.0),
        Point::new(150.0, 100.0),
        Point::new(190.0, 20.0),
    ]);
    s.select_tool(Tool::Erase);
    s.draw(vec![Point::new(0.0, 140.0), Point::new(200.0, 140.0)]);
    s.settle().unwrap();

    let img = photo();
    let a = s.finalize(&img, CANVAS, &NullClock).unwrap();
    let b = s.finalize(&img, CANVAS, &NullClock).unwrap();
    assert_eq!(a.bytes, b.bytes);
    assert_eq!(a.image, b.image);
    assert_eq!(a.quality, b.quality);
    assert_eq!(a.diagnostics.attempts, b.diagnostics.attempts);
}

#[test]
fn unsatisfiable_budget_terminates_with_error() {
    let budget = EncodeBudget {
        max_bytes: 1,
        ..EncodeBudget::default()
    };
    let result = encode_within_budget(&photo(), &budget);
    assert!(matches!(result, Err(MarkupError::BudgetExceeded { .. })));
}

#[test]
fn finalize_over_budget_returns_best_effort() {
    let mut config = SessionConfig::default();
    config.markup.budget.max_bytes = 1;
    let mut s = MarkupSession::new(config).unwrap();
    s.set_canvas_size(CANVAS);
    let out = s.finalize(&photo(), CANVAS, &NullClock).unwrap();
    assert!(!out.within_budget);
    assert!(out.bytes.len() > 1);
    assert!(s.error_message().is_none());
}

#[test]
fn finalize_respects_max_dimension() {
    let mut config = SessionConfig::default();
    config.markup.budget.max_dimension = 64;
    let mut s = MarkupSession::new(config).unwrap();
    s.set_canvas_size(CANVAS);
    let out = s.finalize(&photo(), CANVAS, &NullClock).unwrap();
    assert_eq!(Dimensions::of(&out.image), Dimensions::new(64, 48));
    let decoded = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
}

#[test]
fn detection_then_manual_refinement() {
    // Left half wall (class 0), right half floor (class 3).
    let data = (0..64u32)
        .map(|i| if i % 8 < 4 { 0.0 } else { 3.0 })
        .collect();
    let tensor = ClassTensor::new(vec![8, 8], data).unwrap();
    let segmenter: Arc<dyn Segmenter> = Arc::new(StaticSegmenter::new(tensor));

    let img = photo();
    let mut s =
        MarkupSession::auto_detect(SessionConfig::default(), segmenter, &img, SurfaceKind::Floor)
            .unwrap();
    s.set_canvas_size(CANVAS);
    s.settle().unwrap();

    let surface = s.surface().expect("floor should be accepted");
    assert_eq!(surface.kind(), SurfaceKind::Floor);
    assert_eq!(surface.len(), 32);
    assert!(s.has_markup());

    let preview = s.mask_preview(Dimensions::of(&img)).unwrap().unwrap();
    assert_eq!(preview.get_pixel(10, 10).0[3], 0, "left half not highlighted");
    assert_eq!(preview.get_pixel(150, 60).0[3], 255, "right half highlighted");

    s.draw(vec![Point::new(10.0, 10.0), Point::new(60.0, 10.0)]);
    s.settle().unwrap();
    let out = s.finalize(&img, CANVAS, &NullClock).unwrap();
    assert!(out.within_budget);
    assert!(out.diagnostics.summary.masked);
    assert_eq!(out.diagnostics.summary.stroke_count, 1);
}

#[test]
fn newer_detection_supersedes_older() {
    let walls = ClassTensor::new(vec![2, 2], vec![0.0; 4]).unwrap();
    let doors = ClassTensor::new(vec![2, 2], vec![14.0; 4]).unwrap();
    let img = photo();

    let mut s = session();
    s.start_detection(Arc::new(StaticSegmenter::new(walls)), &img, SurfaceKind::Wall);
    s.start_detection(Arc::new(StaticSegmenter::new(doors)), &img, SurfaceKind::Door);
    s.settle().unwrap();

    assert_eq!(s.surface().unwrap().kind(), SurfaceKind::Door);
    assert!(s.error_message().is_none());
}

#[test]
fn empty_batch_detection_leaves_session_usable() {
    let tensor = ClassTensor::new(vec![0, 3, 4, 4], Vec::new()).unwrap();
    let img = photo();
    let mut s = MarkupSession::auto_detect(
        SessionConfig::default(),
        Arc::new(StaticSegmenter::new(tensor)),
        &img,
        SurfaceKind::Floor,
    )
    .unwrap();
    s.set_canvas_size(CANVAS);
    s.settle().unwrap();
    assert!(s.surface().is_none());
    assert!(s.error_message().is_some());

    s.draw(vec![Point::new(10.0, 10.0), Point::new(90.0, 10.0)]);
    s.settle().unwrap();
    assert!(s.has_markup());
}
