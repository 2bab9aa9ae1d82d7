//! surfacemark-pipeline: Pure image markup pipeline (sans-IO).
//!
//! Turns a photo, an optional detected surface, and a list of
//! user-drawn strokes into a flattened, size-bounded JPEG:
//!
//! - [`mask`]: class tensor -> per-surface pixel masks
//! - [`ledger`]: stroke history with undo/redo
//! - [`geometry`]: canvas space <-> pixel space
//! - [`composite`]: photo + highlight + strokes -> one image
//! - [`diff`]: does the markup visibly change the photo?
//! - [`encode`]: JPEG under a byte and pixel ceiling
//!
//! This crate has **no I/O dependencies** and no notion of threads or
//! sessions; it operates on in-memory buffers and returns structured
//! data. Scheduling and state ownership live in `surfacemark-session`.

pub mod composite;
pub mod diagnostics;
pub mod diff;
pub mod downsample;
pub mod encode;
pub mod finalize;
pub mod geometry;
pub mod ledger;
pub mod mask;
mod raster;
pub mod surface;
pub mod tensor;
pub mod types;

pub use composite::{CompositeStyle, MaskSampling, composite, render_mask_highlight, render_overlay};
pub use diagnostics::{Clock, FinalizeDiagnostics, NullClock};
pub use diff::{DiffConfig, has_markup};
pub use downsample::DownsampleFilter;
pub use encode::{EncodeAttempt, EncodeBudget, EncodedImage, encode_within_budget};
pub use finalize::{Finalized, MarkupConfig, finalize};
pub use geometry::{CanvasGeometry, ScaleFactor, to_canvas_space, to_pixel_space};
pub use ledger::{Stroke, StrokeId, StrokeLedger, Tool};
pub use mask::{ExtractConfig, extract_surfaces};
pub use surface::{SurfaceClassMap, SurfaceKind, SurfaceMask};
pub use tensor::ClassTensor;
pub use types::{Color, Dimensions, GrayImage, MarkupError, Point, RgbaImage, Size};
