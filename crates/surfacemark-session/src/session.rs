//! The markup session: single owner of all editable state.
//!
//! [`MarkupSession`] is an actor in the plain sense: every mutation goes
//! through `&mut self`, so there is exactly one writer. Expensive work
//! (has-markup diffing, surface detection) runs on the rayon pool
//! against a snapshot and reports back over a channel. Replies are
//! applied only when the owner calls [`poll`](MarkupSession::poll) or
//! [`settle`](MarkupSession::settle), never concurrently with an edit.
//!
//! # Stale results
//!
//! Every mutation that can change the markup bumps a revision counter
//! and schedules a diff tagged with it. A diff result is applied only if
//! its revision is newer than the last one applied, so diffs may finish
//! in any order and the newest completed one wins. Detection uses a
//! separate generation counter: starting a new detection orphans any
//! detection still in flight.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use surfacemark_pipeline::ledger::MIN_COMMIT_POINTS;
use surfacemark_pipeline::{
    CanvasGeometry, Clock, Color, Dimensions, Finalized, MarkupError, Point, RgbaImage, Size,
    Stroke, StrokeId, StrokeLedger, SurfaceKind, SurfaceMask, Tool, diff, render_mask_highlight,
};

use crate::config::{SessionConfig, is_valid_width};
use crate::error::{DetectorError, SessionError};
use crate::segmenter::{Segmenter, detect_surfaces};

/// How the session was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    /// The user draws everything by hand.
    ManualOnly,
    /// A surface of this kind is detected first, then refined by hand.
    AutoDetect(SurfaceKind),
}

/// What the session is busy with, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Ready for input.
    #[default]
    Idle,
    /// Waiting for surface detection.
    Detecting,
    /// Compositing and encoding the output.
    Finalizing,
}

impl SessionStatus {
    /// Busy-indicator text, or `None` when idle.
    #[must_use]
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Detecting => Some("Analyzing..."),
            Self::Finalizing => Some("Preparing..."),
        }
    }

    /// Returns `true` unless idle.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// A message from a background job.
enum Reply {
    Diff {
        revision: u64,
        result: Result<bool, MarkupError>,
    },
    Detection {
        generation: u64,
        kind: SurfaceKind,
        result: Result<Vec<SurfaceMask>, DetectorError>,
    },
}

/// One editing session over one photo.
pub struct MarkupSession {
    config: SessionConfig,
    mode: EditorMode,
    ledger: StrokeLedger,
    surface: Option<Arc<SurfaceMask>>,
    canvas: Size,
    tool: Tool,
    brush_width: f64,
    eraser_width: f64,
    has_markup: bool,
    status: SessionStatus,
    error: Option<String>,
    revision: u64,
    applied_revision: u64,
    detection_generation: u64,
    pending: usize,
    tx: Sender<Reply>,
    rx: Receiver<Reply>,
}

impl MarkupSession {
    /// Open an empty manual session.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            brush_width: config.brush_width,
            eraser_width: config.eraser_width,
            config,
            mode: EditorMode::ManualOnly,
            ledger: StrokeLedger::new(),
            surface: None,
            canvas: Size::ZERO,
            tool: Tool::Paint,
            has_markup: false,
            status: SessionStatus::Idle,
            error: None,
            revision: 0,
            applied_revision: 0,
            detection_generation: 0,
            pending: 0,
            tx,
            rx,
        })
    }

    /// Open a session and immediately start detecting `kind` in `photo`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn auto_detect(
        config: SessionConfig,
        segmenter: Arc<dyn Segmenter>,
        photo: &RgbaImage,
        kind: SurfaceKind,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(config)?;
        session.mode = EditorMode::AutoDetect(kind);
        session.start_detection(segmenter, photo, kind);
        Ok(session)
    }

    // -- read-only state ---------------------------------------------------

    /// How the session was opened.
    #[must_use]
    pub const fn mode(&self) -> EditorMode {
        self.mode
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the markup currently changes the photo visibly.
    ///
    /// Reflects the newest diff applied so far; call
    /// [`poll`](Self::poll) or [`settle`](Self::settle) to pick up
    /// background results.
    #[must_use]
    pub const fn has_markup(&self) -> bool {
        self.has_markup
    }

    /// Returns `true` if a stroke can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.ledger.can_undo()
    }

    /// Returns `true` if a stroke can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.ledger.can_redo()
    }

    /// Current busy state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// The last user-visible error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Forget the last error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// The selected tool.
    #[must_use]
    pub const fn tool(&self) -> Tool {
        self.tool
    }

    /// Width that the next [`draw`](Self::draw) will use.
    #[must_use]
    pub const fn current_width(&self) -> f64 {
        match self.tool {
            Tool::Paint => self.brush_width,
            Tool::Erase => self.eraser_width,
        }
    }

    /// The accepted surface mask, if any.
    #[must_use]
    pub fn surface(&self) -> Option<&SurfaceMask> {
        self.surface.as_deref()
    }

    /// Committed strokes in commit order.
    #[must_use]
    pub fn strokes(&self) -> &[Arc<Stroke>] {
        self.ledger.strokes()
    }

    /// The canvas size strokes are authored against.
    #[must_use]
    pub const fn canvas_size(&self) -> Size {
        self.canvas
    }

    /// Mapping from the current canvas onto a `pixels` buffer, or `None`
    /// while the canvas is empty.
    #[must_use]
    pub fn geometry(&self, pixels: Dimensions) -> Option<CanvasGeometry> {
        CanvasGeometry::new(self.canvas, pixels)
    }

    // -- edits --------------------------------------------------------------

    /// Select the tool for subsequent [`draw`](Self::draw) calls.
    pub const fn select_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Set the width of the selected tool.
    ///
    /// Non-positive or non-finite widths are ignored.
    pub fn set_brush_width(&mut self, width: f64) {
        if !is_valid_width(width) {
            tracing::warn!(width, "ignoring invalid brush width");
            return;
        }
        match self.tool {
            Tool::Paint => self.brush_width = width,
            Tool::Erase => self.eraser_width = width,
        }
    }

    /// Update the canvas size and recompute has-markup.
    pub fn set_canvas_size(&mut self, size: Size) {
        self.canvas = size;
        self.markup_changed();
    }

    /// Commit a stroke and recompute has-markup.
    ///
    /// Strokes with fewer than two points, or a non-positive or
    /// non-finite width, are rejected and `None` is returned; the ledger
    /// is untouched.
    pub fn add_stroke(
        &mut self,
        points: Vec<Point>,
        tool: Tool,
        width: f64,
        color: Color,
    ) -> Option<StrokeId> {
        if points.len() < MIN_COMMIT_POINTS {
            tracing::debug!(points = points.len(), "dropping degenerate stroke");
            return None;
        }
        if !is_valid_width(width) {
            tracing::warn!(width, "dropping stroke with invalid width");
            return None;
        }
        let stroke = Stroke::new(points, tool, width, color);
        let id = stroke.id();
        self.ledger.commit(stroke);
        tracing::debug!(%id, %tool, width, "stroke committed");
        self.markup_changed();
        Some(id)
    }

    /// Commit a stroke with the selected tool, its width, and the session
    /// brush color.
    pub fn draw(&mut self, points: Vec<Point>) -> Option<StrokeId> {
        let color = self.config.brush_color;
        self.add_stroke(points, self.tool, self.current_width(), color)
    }

    /// Undo the last stroke. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let changed = self.ledger.undo();
        if changed {
            self.markup_changed();
        }
        changed
    }

    /// Redo the last undone stroke. Returns `false` if there was nothing
    /// to redo.
    pub fn redo(&mut self) -> bool {
        let changed = self.ledger.redo();
        if changed {
            self.markup_changed();
        }
        changed
    }

    /// Make `mask` the active surface, replacing any previous one.
    pub fn accept_detected_mask(&mut self, mask: SurfaceMask) {
        tracing::debug!(kind = %mask.kind(), coverage = mask.coverage(), "surface accepted");
        self.surface = Some(Arc::new(mask));
        self.markup_changed();
    }

    // -- background work ---------------------------------------------------

    /// Start detecting `kind` in `photo` on a background worker.
    ///
    /// On completion the matching mask is accepted, or a
    /// [`SessionError::SurfaceNotDetected`] is recorded. Any detection
    /// already in flight is superseded.
    pub fn start_detection(
        &mut self,
        segmenter: Arc<dyn Segmenter>,
        photo: &RgbaImage,
        kind: SurfaceKind,
    ) {
        self.detection_generation += 1;
        let generation = self.detection_generation;
        self.status = SessionStatus::Detecting;
        self.error = None;

        let photo = photo.clone();
        let model_input = self.config.model_input;
        let extract = self.config.markup.extract.clone();
        let tx = self.tx.clone();
        self.pending += 1;
        tracing::debug!(generation, %kind, "detection started");
        rayon::spawn(move || {
            let result = detect_surfaces(segmenter.as_ref(), &photo, model_input, &extract);
            // The session may be gone; nothing to report to then.
            let _ = tx.send(Reply::Detection {
                generation,
                kind,
                result,
            });
        });
    }

    /// Apply every background result that has already arrived.
    pub fn poll(&mut self) {
        while let Ok(reply) = self.rx.try_recv() {
            self.apply(reply);
        }
    }

    /// Block until every scheduled background job has reported, applying
    /// results as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerGone`] if the reply channel closes
    /// with jobs outstanding.
    pub fn settle(&mut self) -> Result<(), SessionError> {
        while self.pending > 0 {
            let reply = self.rx.recv().map_err(|_| SessionError::WorkerGone)?;
            self.apply(reply);
        }
        Ok(())
    }

    /// Render the accepted surface alone, for previewing it.
    ///
    /// Returns `Ok(None)` when no surface is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Markup`] if `target` has a zero side.
    pub fn mask_preview(&self, target: Dimensions) -> Result<Option<RgbaImage>, SessionError> {
        let Some(surface) = self.surface.as_deref() else {
            return Ok(None);
        };
        Ok(Some(render_mask_highlight(surface, target, &self.config.markup.style)?))
    }

    /// Composite the markup over `photo` and encode it.
    ///
    /// `canvas` is the size the strokes were authored against. Runs on
    /// the worker pool and blocks until done. Missing the byte budget is
    /// not an error; see [`Finalized::within_budget`].
    ///
    /// # Errors
    ///
    /// - [`SessionError::CompressionFailed`] if a buffer cannot be
    ///   allocated or the encoder fails.
    /// - [`SessionError::Markup`] for other pipeline errors, such as an
    ///   empty `canvas` while strokes exist.
    pub fn finalize<C: Clock + Sync>(
        &mut self,
        photo: &RgbaImage,
        canvas: Size,
        clock: &C,
    ) -> Result<Finalized, SessionError> {
        self.poll();
        self.status = SessionStatus::Finalizing;

        let strokes = self.ledger.snapshot();
        let surface = self.surface.clone();
        let config = &self.config.markup;
        let mut outcome = None;
        rayon::scope(|s| {
            s.spawn(|_| {
                outcome = Some(surfacemark_pipeline::finalize(
                    photo,
                    surface.as_deref(),
                    &strokes,
                    canvas,
                    config,
                    clock,
                ));
            });
        });
        self.status = SessionStatus::Idle;

        let result = match outcome {
            Some(Ok(finalized)) => return Ok(finalized),
            Some(Err(e @ (MarkupError::Allocation { .. } | MarkupError::ImageEncode(_)))) => {
                SessionError::CompressionFailed(e)
            }
            Some(Err(e)) => SessionError::Markup(e),
            None => SessionError::WorkerGone,
        };
        tracing::warn!(error = %result, "finalize failed");
        self.report(&result);
        Err(result)
    }

    // -- internals ---------------------------------------------------------

    /// Schedule a has-markup recompute for the current state.
    fn markup_changed(&mut self) {
        self.revision += 1;
        let revision = self.revision;
        let surface = self.surface.clone();
        let diff_config = self.config.markup.diff;

        if self.ledger.is_empty() {
            // Without strokes the answer needs no rasterization.
            let no_strokes: [Arc<Stroke>; 0] = [];
            let result = diff::has_markup(surface.as_deref(), &no_strokes, self.canvas, &diff_config);
            self.apply_diff(revision, result);
            return;
        }

        let strokes = self.ledger.snapshot();
        let canvas = self.canvas;
        let tx = self.tx.clone();
        self.pending += 1;
        rayon::spawn(move || {
            let result = diff::has_markup(surface.as_deref(), &strokes, canvas, &diff_config);
            let _ = tx.send(Reply::Diff { revision, result });
        });
    }

    /// Record `err` as the user-visible error.
    fn report(&mut self, err: &SessionError) {
        self.error = Some(err.to_string());
    }

    fn apply(&mut self, reply: Reply) {
        self.pending = self.pending.saturating_sub(1);
        match reply {
            Reply::Diff { revision, result } => self.apply_diff(revision, result),
            Reply::Detection {
                generation,
                kind,
                result,
            } => self.apply_detection(generation, kind, result),
        }
    }

    fn apply_diff(&mut self, revision: u64, result: Result<bool, MarkupError>) {
        if revision <= self.applied_revision {
            tracing::debug!(revision, applied = self.applied_revision, "discarding stale diff");
            return;
        }
        self.applied_revision = revision;
        match result {
            Ok(visible) => self.has_markup = visible,
            Err(e) => tracing::warn!(revision, error = %e, "has-markup diff failed"),
        }
    }

    fn apply_detection(
        &mut self,
        generation: u64,
        kind: SurfaceKind,
        result: Result<Vec<SurfaceMask>, DetectorError>,
    ) {
        if generation != self.detection_generation {
            tracing::debug!(generation, current = self.detection_generation, "discarding stale detection");
            return;
        }
        self.status = SessionStatus::Idle;
        match result {
            Ok(masks) => {
                if let Some(mask) = masks.into_iter().find(|m| m.kind() == kind) {
                    self.accept_detected_mask(mask);
                } else {
                    tracing::info!(%kind, "surface not detected");
                    self.report(&SessionError::SurfaceNotDetected(kind));
                }
            }
            Err(e) => {
                tracing::warn!(%kind, error = %e, "surface detection failed");
                self.report(&SessionError::Detector(e));
            }
        }
    }
}
