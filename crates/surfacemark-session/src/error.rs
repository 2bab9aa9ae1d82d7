//! Errors surfaced by the session and by segmentation back ends.

use surfacemark_pipeline::{MarkupError, SurfaceKind};

/// Failures reported by a [`Segmenter`](crate::segmenter::Segmenter).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectorError {
    /// The model file could not be found.
    #[error("segmentation model not found: {0}")]
    ModelNotFound(String),

    /// The model exists but has not been loaded.
    #[error("segmentation model is not loaded")]
    ModelNotLoaded,

    /// The input image could not be used for inference.
    #[error("invalid input image for segmentation")]
    InvalidImage,

    /// Inference ran but produced no usable output.
    #[error("segmentation produced no results")]
    NoResults,
}

/// Errors surfaced by a [`MarkupSession`](crate::session::MarkupSession).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Surface detection failed.
    #[error(transparent)]
    Detector(#[from] DetectorError),

    /// Detection finished but the requested surface was not found. The
    /// session stays usable for manual drawing.
    #[error("{0} not detected, draw manually")]
    SurfaceNotDetected(SurfaceKind),

    /// A pipeline operation failed.
    #[error(transparent)]
    Markup(#[from] MarkupError),

    /// The composite could not be encoded.
    #[error("compression failed: {0}")]
    CompressionFailed(#[source] MarkupError),

    /// A background job ended without reporting back.
    #[error("background worker stopped before reporting a result")]
    WorkerGone,

    /// Session configuration is invalid.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_detected_message_names_the_surface() {
        let err = SessionError::SurfaceNotDetected(SurfaceKind::Floor);
        assert_eq!(err.to_string(), "Floor not detected, draw manually");
    }

    #[test]
    fn detector_errors_pass_through() {
        let err = SessionError::from(DetectorError::ModelNotFound("seg.onnx".to_string()));
        assert_eq!(err.to_string(), "segmentation model not found: seg.onnx");
    }

    #[test]
    fn compression_failure_keeps_source() {
        let err = SessionError::CompressionFailed(MarkupError::Allocation {
            width: 0,
            height: 0,
        });
        assert!(err.to_string().starts_with("compression failed: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
