//! Finalize diagnostics: timing and size metrics for compositing and
//! encoding.
//!
//! Every call to [`finalize`](crate::finalize) collects diagnostics
//! alongside the result. Time is read through the [`Clock`] trait so the
//! pipeline itself never touches a platform timer; callers supply one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encode::EncodeAttempt;
use crate::types::Dimensions;

/// Source of monotonic time for diagnostics.
pub trait Clock {
    /// An opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances.
///
/// Useful in tests and wherever timing is irrelevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single finalize run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeDiagnostics {
    /// Compositing the photo, mask, and strokes.
    pub composite: StageDiagnostics,
    /// Encoding within the budget.
    pub encode: StageDiagnostics,
    /// Every encode attempt, in order.
    pub attempts: Vec<EncodeAttempt>,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of inputs and output.
    pub summary: FinalizeSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl StageDiagnostics {
    /// Stage diagnostics for a measured duration.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

/// High-level summary of a finalize run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeSummary {
    /// Photo size in pixels.
    pub photo: Dimensions,
    /// Number of committed strokes rendered.
    pub stroke_count: usize,
    /// Whether a surface mask was composited.
    pub masked: bool,
    /// Encoded size in pixels.
    pub output: Dimensions,
    /// Encoded size in bytes.
    pub output_bytes: usize,
    /// JPEG quality of the kept attempt.
    pub quality: u8,
    /// Byte ceiling that applied.
    pub max_bytes: usize,
    /// Whether the output fits `max_bytes`.
    pub within_budget: bool,
}

impl FinalizeDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        let s = &self.summary;

        lines.push(format!("Finalize Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Photo: {}x{}  |  Strokes: {}  |  Mask: {}",
            s.photo.width,
            s.photo.height,
            s.stroke_count,
            if s.masked { "yes" } else { "no" },
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!("{:<24} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(60));
        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in [("Composite", &self.composite), ("Encode", &self.encode)] {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.push(String::new());
        lines.push(format!("{:<6} {:>7} {:>12} {:>12}", "Try", "Quality", "Size", "Bytes"));
        for (i, a) in self.attempts.iter().enumerate() {
            lines.push(format!(
                "{:<6} {:>7} {:>12} {:>12}",
                i + 1,
                a.quality,
                format!("{}x{}", a.dimensions.width, a.dimensions.height),
                a.bytes,
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Output: {}x{} q{} {} bytes (budget {} bytes, {})",
            s.output.width,
            s.output.height,
            s.quality,
            s.output_bytes,
            s.max_bytes,
            if s.within_budget { "within" } else { "EXCEEDED" },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
