//! Composite-then-encode: the one-shot export of a markup.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::composite::{self, CompositeStyle};
use crate::diagnostics::{Clock, FinalizeDiagnostics, FinalizeSummary, StageDiagnostics};
use crate::diff::DiffConfig;
use crate::encode::{self, EncodeBudget, EncodedImage};
use crate::ledger::Stroke;
use crate::mask::ExtractConfig;
use crate::surface::SurfaceMask;
use crate::types::{Dimensions, MarkupError, RgbaImage, Size};

/// Every pipeline tunable in one place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Mask extraction.
    pub extract: ExtractConfig,
    /// Compositing appearance.
    pub style: CompositeStyle,
    /// Has-markup detection.
    pub diff: DiffConfig,
    /// Output size limits.
    pub budget: EncodeBudget,
}

impl MarkupConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`MarkupError::InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), MarkupError> {
        self.extract.validate()?;
        self.diff.validate()?;
        self.budget.validate()
    }
}

/// The exported markup.
#[derive(Debug, Clone)]
pub struct Finalized {
    /// The bitmap that was encoded, after any downscale.
    pub image: RgbaImage,
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    /// JPEG quality used.
    pub quality: u8,
    /// `false` if no attempt met the byte ceiling and the most reduced
    /// attempt was kept anyway.
    pub within_budget: bool,
    /// Timing and size metrics.
    pub diagnostics: FinalizeDiagnostics,
}

/// Composite the markup over `photo` and encode it within
/// `config.budget`.
///
/// Missing the byte ceiling is not an error: the most reduced attempt is
/// returned with `within_budget == false`.
///
/// # Errors
///
/// Returns any [`MarkupError`] from compositing, or from encoding other
/// than [`MarkupError::BudgetExceeded`].
pub fn finalize<S: Borrow<Stroke>, C: Clock>(
    photo: &RgbaImage,
    surface: Option<&SurfaceMask>,
    strokes: &[S],
    canvas: Size,
    config: &MarkupConfig,
    clock: &C,
) -> Result<Finalized, MarkupError> {
    let start = clock.now();

    let t = clock.now();
    let composed = composite::composite(photo, surface, strokes, canvas, &config.style)?;
    let composite_diag = StageDiagnostics::new(clock.elapsed(&t));

    let t = clock.now();
    let (encoded, within_budget) = match encode::encode_within_budget(&composed, &config.budget) {
        Ok(encoded) => (encoded, true),
        Err(MarkupError::BudgetExceeded {
            max_bytes,
            best_size,
            best,
        }) => {
            tracing::warn!(max_bytes, best_size, "output exceeds byte budget; keeping most reduced attempt");
            (*best, false)
        }
        Err(e) => return Err(e),
    };
    let encode_diag = StageDiagnostics::new(clock.elapsed(&t));

    Ok(assemble(
        encoded,
        within_budget,
        Diagnosed {
            photo: Dimensions::of(photo),
            stroke_count: strokes.len(),
            masked: surface.is_some(),
            max_bytes: config.budget.max_bytes,
            composite: composite_diag,
            encode: encode_diag,
            total: clock.elapsed(&start),
        },
    ))
}

/// Measurements gathered while finalizing.
struct Diagnosed {
    photo: Dimensions,
    stroke_count: usize,
    masked: bool,
    max_bytes: usize,
    composite: StageDiagnostics,
    encode: StageDiagnostics,
    total: std::time::Duration,
}

fn assemble(encoded: EncodedImage, within_budget: bool, d: Diagnosed) -> Finalized {
    let output = encoded.dimensions();
    let quality = encoded.quality();
    let attempts = encoded.attempts().to_vec();
    let (image, bytes) = encoded.into_parts();
    let diagnostics = FinalizeDiagnostics {
        composite: d.composite,
        encode: d.encode,
        attempts,
        total_duration: d.total,
        summary: FinalizeSummary {
            photo: d.photo,
            stroke_count: d.stroke_count,
            masked: d.masked,
            output,
            output_bytes: bytes.len(),
            quality,
            max_bytes: d.max_bytes,
            within_budget,
        },
    };
    tracing::debug!(
        width = output.width,
        height = output.height,
        bytes = bytes.len(),
        quality,
        within_budget,
        "finalized markup",
    );
    Finalized {
        image,
        bytes,
        quality,
        within_budget,
        diagnostics,
    }
}
