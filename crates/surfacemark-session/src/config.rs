//! Session configuration.

use serde::{Deserialize, Serialize};
use surfacemark_pipeline::{Color, Dimensions, MarkupConfig};

use crate::error::SessionError;

/// Tunables for a [`MarkupSession`](crate::session::MarkupSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pipeline settings used for diffing, detection, and finalize.
    pub markup: MarkupConfig,

    /// Initial paint brush width in canvas units.
    pub brush_width: f64,

    /// Initial eraser width in canvas units.
    pub eraser_width: f64,

    /// Color of strokes drawn with [`MarkupSession::draw`](crate::session::MarkupSession::draw).
    pub brush_color: Color,

    /// Size the photo is stretched to before segmentation.
    pub model_input: Dimensions,
}

impl SessionConfig {
    /// Default paint brush width.
    pub const DEFAULT_BRUSH_WIDTH: f64 = 40.0;

    /// Default eraser width.
    pub const DEFAULT_ERASER_WIDTH: f64 = 60.0;

    /// Default brush color.
    pub const DEFAULT_BRUSH_COLOR: Color = Color::NEUTRAL;

    /// Default segmentation model input size.
    pub const DEFAULT_MODEL_INPUT: Dimensions = Dimensions::new(1024, 1024);

    /// Check invariants, including the nested pipeline config.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for a non-positive width or
    /// an empty model input, or [`SessionError::Markup`] if the pipeline
    /// config is invalid.
    pub fn validate(&self) -> Result<(), SessionError> {
        self.markup.validate()?;
        for (name, width) in [("brush_width", self.brush_width), ("eraser_width", self.eraser_width)] {
            if !is_valid_width(width) {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {width}"
                )));
            }
        }
        if self.model_input.is_empty() {
            return Err(SessionError::InvalidConfig(
                "model_input must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            markup: MarkupConfig::default(),
            brush_width: Self::DEFAULT_BRUSH_WIDTH,
            eraser_width: Self::DEFAULT_ERASER_WIDTH,
            brush_color: Self::DEFAULT_BRUSH_COLOR,
            model_input: Self::DEFAULT_MODEL_INPUT,
        }
    }
}

/// Returns `true` for a usable stroke width.
pub(crate) fn is_valid_width(width: f64) -> bool {
    width.is_finite() && width > 0.0
}
