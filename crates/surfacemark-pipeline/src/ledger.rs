//! Strokes and the undo/redo ledger that records them.
//!
//! The ledger is a pure data structure: it never renders and never
//! inspects stroke geometry. Strokes are shared behind [`Arc`] so a
//! snapshot of the committed sequence can be handed to a background
//! worker without copying point data.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Color, Point};

/// Minimum number of points a stroke needs before it may be committed.
pub const MIN_COMMIT_POINTS: usize = 2;

/// What a stroke does to the markup beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Alpha-blend the stroke color over the markup.
    #[default]
    Paint,
    /// Clear the markup under the stroke, leaving the photo visible.
    Erase,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paint => f.write_str("Paint"),
            Self::Erase => f.write_str("Erase"),
        }
    }
}

/// Unique stroke identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrokeId(Uuid);

impl StrokeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A user-drawn path in canvas coordinates.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    id: StrokeId,
    points: Vec<Point>,
    tool: Tool,
    width: f64,
    color: Color,
}

impl Stroke {
    /// Create a stroke with a fresh id.
    ///
    /// `width` is in canvas units. `color` is ignored by [`Tool::Erase`].
    #[must_use]
    pub fn new(points: Vec<Point>, tool: Tool, width: f64, color: Color) -> Self {
        Self {
            id: StrokeId::new(),
            points,
            tool,
            width,
            color,
        }
    }

    /// The stroke id.
    #[must_use]
    pub const fn id(&self) -> StrokeId {
        self.id
    }

    /// Points in canvas coordinates, in drawing order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The tool the stroke was drawn with.
    #[must_use]
    pub const fn tool(&self) -> Tool {
        self.tool
    }

    /// Brush width in canvas units.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Paint color and alpha.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Returns `true` if the stroke has enough points to be committed.
    #[must_use]
    pub fn is_committable(&self) -> bool {
        self.points.len() >= MIN_COMMIT_POINTS
    }
}

/// Committed strokes plus a redo buffer.
///
/// # Invariants
///
/// - Committing clears the redo buffer; undone strokes are discarded,
///   not hidden.
/// - Undo moves exactly one stroke from the end of the committed
///   sequence to the end of the redo buffer; redo does the inverse.
/// - Only committable strokes (see [`Stroke::is_committable`]) are
///   committed. Filtering is the caller's job; the session rejects
///   degenerate strokes before they reach the ledger.
#[derive(Debug, Clone, Default)]
pub struct StrokeLedger {
    committed: Vec<Arc<Stroke>>,
    undone: Vec<Arc<Stroke>>,
}

impl StrokeLedger {
    /// An empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            committed: Vec::new(),
            undone: Vec::new(),
        }
    }

    /// Append a stroke and drop the redo buffer.
    pub fn commit(&mut self, stroke: Stroke) {
        debug_assert!(
            stroke.is_committable(),
            "strokes with fewer than {MIN_COMMIT_POINTS} points must be filtered before commit",
        );
        self.committed.push(Arc::new(stroke));
        self.undone.clear();
    }

    /// Move the last committed stroke to the redo buffer.
    ///
    /// Returns `false` (and does nothing) if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(stroke) = self.committed.pop() else {
            return false;
        };
        self.undone.push(stroke);
        true
    }

    /// Move the last undone stroke back to the committed sequence.
    ///
    /// Returns `false` (and does nothing) if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(stroke) = self.undone.pop() else {
            return false;
        };
        self.committed.push(stroke);
        true
    }

    /// Returns `true` if a stroke can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    /// Returns `true` if a stroke can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Committed strokes in commit order.
    #[must_use]
    pub fn strokes(&self) -> &[Arc<Stroke>] {
        &self.committed
    }

    /// Undone strokes; the last element is the next one redo restores.
    #[must_use]
    pub fn redo_strokes(&self) -> &[Arc<Stroke>] {
        &self.undone
    }

    /// Cheap copy of the committed sequence for background rendering.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Stroke>> {
        self.committed.clone()
    }

    /// Returns `true` if no strokes are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(x: f64) -> Stroke {
        Stroke::new(
            vec![Point::new(x, 0.0), Point::new(x, 10.0)],
            Tool::Paint,
            4.0,
            Color::NEUTRAL,
        )
    }

    fn ids(strokes: &[Arc<Stroke>]) -> Vec<StrokeId> {
        strokes.iter().map(|s| s.id()).collect()
    }

    fn assert_flags(ledger: &StrokeLedger) {
        assert_eq!(ledger.can_undo(), !ledger.strokes().is_empty());
        assert_eq!(ledger.can_redo(), !ledger.redo_strokes().is_empty());
    }

    #[test]
    fn new_ledger_is_empty() {
        let ledger = StrokeLedger::new();
        assert!(ledger.is_empty());
        assert!(!ledger.can_undo());
        assert!(!ledger.can_redo());
    }

    #[test]
    fn stroke_ids_are_unique() {
        assert_ne!(line(0.0).id(), line(0.0).id());
    }

    #[test]
    fn single_point_stroke_is_not_committable() {
        let s = Stroke::new(vec![Point::new(1.0, 1.0)], Tool::Paint, 1.0, Color::NEUTRAL);
        assert!(!s.is_committable());
        assert!(line(0.0).is_committable());
    }

    #[test]
    fn undo_and_redo_move_one_stroke() {
        let mut ledger = StrokeLedger::new();
        let (a, b) = (line(1.0), line(2.0));
        let (id_a, id_b) = (a.id(), b.id());
        ledger.commit(a);
        ledger.commit(b);

        assert!(ledger.undo());
        assert_eq!(ids(ledger.strokes()), vec![id_a]);
        assert_eq!(ids(ledger.redo_strokes()), vec![id_b]);

        assert!(ledger.undo());
        assert!(ledger.strokes().is_empty());
        assert_eq!(ids(ledger.redo_strokes()), vec![id_b, id_a]);

        assert!(ledger.redo());
        assert_eq!(ids(ledger.strokes()), vec![id_a]);
        assert!(ledger.redo());
        assert_eq!(ids(ledger.strokes()), vec![id_a, id_b]);
        assert!(!ledger.can_redo());
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut ledger = StrokeLedger::new();
        assert!(!ledger.undo());
        assert!(!ledger.redo());
        assert!(ledger.is_empty());
    }

    #[test]
    fn commit_after_undo_discards_redo() {
        let mut ledger = StrokeLedger::new();
        ledger.commit(line(1.0));
        ledger.commit(line(2.0));
        ledger.undo();
        assert!(ledger.can_redo());

        let c = line(3.0);
        let id_c = c.id();
        ledger.commit(c);
        assert!(!ledger.can_redo());
        assert!(!ledger.redo(), "redo after commit must be a no-op");
        assert_eq!(ledger.strokes().len(), 2);
        assert_eq!(ledger.strokes()[1].id(), id_c);
    }

    #[test]
    fn flags_track_sequences_through_mixed_operations() {
        let mut ledger = StrokeLedger::new();
        // Deterministic op script: 0 = commit, 1 = undo, 2 = redo.
        let script = [0, 0, 1, 2, 1, 1, 1, 0, 2, 1, 2, 2, 0, 0, 1, 0, 1, 1, 2];
        for (i, op) in script.into_iter().enumerate() {
            match op {
                0 => ledger.commit(line(f64::from(u8::try_from(i).unwrap()))),
                1 => {
                    ledger.undo();
                }
                _ => {
                    ledger.redo();
                }
            }
            assert_flags(&ledger);
        }
    }

    #[test]
    fn snapshot_shares_strokes() {
        let mut ledger = StrokeLedger::new();
        ledger.commit(line(1.0));
        let snap = ledger.snapshot();
        assert!(Arc::ptr_eq(&snap[0], &ledger.strokes()[0]));
        ledger.undo();
        assert_eq!(snap.len(), 1, "snapshot is unaffected by later edits");
    }

    #[test]
    fn tool_serde_names() {
        assert_eq!(serde_json::to_string(&Tool::Erase).unwrap(), r#""erase""#);
        assert_eq!(Tool::default(), Tool::Paint);
    }

    #[test]
    fn stroke_id_serializes_as_uuid_string() {
        let id = line(1.0).id();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: StrokeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
