//! surfacemark-session: owner of an interactive markup session.
//!
//! Wraps the sans-IO `surfacemark-pipeline` in a single-writer
//! [`MarkupSession`] that schedules diffing and surface detection on a
//! background pool, discards stale results, and exposes the read-only
//! state a UI binds to (has-markup, undo/redo availability, status,
//! user-visible errors).
//!
//! Segmentation itself is a black box behind the [`Segmenter`] trait.

pub mod config;
pub mod error;
pub mod segmenter;
pub mod session;
pub mod startup;

pub use config::SessionConfig;
pub use error::{DetectorError, SessionError};
pub use segmenter::{Segmenter, StaticSegmenter, detect_surfaces};
pub use session::{EditorMode, MarkupSession, SessionStatus};
