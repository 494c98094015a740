//! Two-point scale calibration
//!
//! The user clicks two points on a feature of known length and types that
//! length. The resulting scale factor (real-world units per pixel) converts
//! every later measurement. Until calibrated, the factor is 1.0 and the unit
//! is raw pixels.

use crate::annotation::Point;
use crate::error::{EditorError, EditorResult};
use crate::measurement::euclidean_distance;
use tracing::{info, warn};

/// Scale factor before any calibration (raw pixels)
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;

/// Unit label before any calibration
pub const PIXEL_UNIT: &str = "px";

/// Where the calibration gesture currently stands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationPhase {
    /// Not calibrating; measuring and drawing are available
    Idle,
    /// Calibration mode entered, no point collected yet
    AwaitingFirstPoint,
    /// One point collected
    AwaitingSecondPoint { first: Point },
}

/// Result of feeding a point to the calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationProgress {
    /// The first reference point was stored
    FirstPointRecorded(Point),
    /// Both points were collected and a new scale factor is active
    Calibrated {
        pixel_distance: f64,
        real_length: f64,
        scale_factor: f64,
    },
}

/// Calibration state of an editing session
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    phase: CalibrationPhase,
    scale_factor: f64,
    unit: String,
    /// Unit that the calibration in progress will assign
    pending_unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            scale_factor: DEFAULT_SCALE_FACTOR,
            unit: PIXEL_UNIT.to_string(),
            pending_unit: PIXEL_UNIT.to_string(),
        }
    }
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter calibration mode, discarding any half-collected points
    pub fn begin(&mut self, unit: impl Into<String>) {
        self.phase = CalibrationPhase::AwaitingFirstPoint;
        self.pending_unit = unit.into();
    }

    /// Leave calibration mode without touching the active scale
    pub fn cancel(&mut self) {
        self.phase = CalibrationPhase::Idle;
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// True between [`Calibration::begin`] and the second point
    pub fn is_active(&self) -> bool {
        self.phase != CalibrationPhase::Idle
    }

    /// Real-world units per pixel
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Convert a pixel distance to real-world units
    pub fn to_real(&self, pixels: f64) -> f64 {
        pixels * self.scale_factor
    }

    /// Collect a calibration point
    ///
    /// On the second point, `prompt` is called with the pixel distance between
    /// the two points and must return the user's reference length as typed.
    /// On error the first point is kept so the user can pick the second again.
    pub fn add_point<F>(&mut self, point: Point, prompt: F) -> EditorResult<CalibrationProgress>
    where
        F: FnOnce(f64) -> String,
    {
        match self.phase {
            CalibrationPhase::Idle => {
                Err(EditorError::InvalidInput("calibration mode is not active".to_string()))
            }
            CalibrationPhase::AwaitingFirstPoint => {
                self.phase = CalibrationPhase::AwaitingSecondPoint { first: point };
                Ok(CalibrationProgress::FirstPointRecorded(point))
            }
            CalibrationPhase::AwaitingSecondPoint { first } => {
                let pixel_distance = euclidean_distance(&first, &point);
                if pixel_distance == 0.0 {
                    warn!("calibration points coincide");
                    return Err(EditorError::DegenerateCalibration);
                }

                let real_length = parse_reference_length(&prompt(pixel_distance))?;
                let scale_factor = real_length / pixel_distance;

                self.scale_factor = scale_factor;
                self.unit = self.pending_unit.clone();
                self.phase = CalibrationPhase::Idle;
                info!(pixel_distance, real_length, scale_factor, unit = %self.unit, "calibrated");

                Ok(CalibrationProgress::Calibrated { pixel_distance, real_length, scale_factor })
            }
        }
    }

    /// Set the scale factor directly (units per pixel)
    pub fn set_scale_factor(
        &mut self,
        scale_factor: f64,
        unit: impl Into<String>,
    ) -> EditorResult<()> {
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            return Err(EditorError::InvalidInput(format!(
                "scale factor must be a positive number, got {scale_factor}"
            )));
        }
        self.scale_factor = scale_factor;
        self.unit = unit.into();
        self.phase = CalibrationPhase::Idle;
        Ok(())
    }

    /// Set the scale factor from a `"1:50"` style ratio
    pub fn set_scale_ratio(&mut self, ratio: &str, unit: impl Into<String>) -> EditorResult<()> {
        let scale_factor = parse_scale_ratio(ratio)?;
        self.set_scale_factor(scale_factor, unit)
    }

    /// Back to raw pixels
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parse the reference length typed by the user
///
/// Rejects empty, non-numeric, non-finite, zero and negative input.
pub fn parse_reference_length(input: &str) -> EditorResult<f64> {
    let trimmed = input.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| EditorError::InvalidInput(format!("'{trimmed}' is not a number")))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(EditorError::InvalidInput(format!(
            "reference length must be positive, got '{trimmed}'"
        )));
    }
    Ok(value)
}

/// Parse a `"numerator:denominator"` scale ratio into `numerator / denominator`
///
/// Both parts must be positive finite numbers; nothing else is evaluated.
pub fn parse_scale_ratio(input: &str) -> EditorResult<f64> {
    let (numerator, denominator) = input.split_once(':').ok_or_else(|| {
        EditorError::InvalidInput(format!("'{}' is not a ratio like 1:50", input.trim()))
    })?;

    let part = |text: &str| -> EditorResult<f64> {
        let text = text.trim();
        text.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value > 0.0)
            .ok_or_else(|| {
                EditorError::InvalidInput(format!("ratio part '{text}' must be a positive number"))
            })
    };

    Ok(part(numerator)? / part(denominator)?)
}
