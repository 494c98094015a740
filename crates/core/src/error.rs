//! Error types for editing operations
//!
//! Every error is local to the operation that raised it: the scene and the
//! history are left exactly as they were before the call.

/// Errors reported to the user by the editing session
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Calibration length or scale ratio was not a positive number
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The two calibration points coincide
    #[error("calibration points coincide; pick two distinct points")]
    DegenerateCalibration,

    /// A style, material or rotation change was requested with nothing selected
    #[error("no shape is selected")]
    EmptySelection,

    /// The selected file is not a PDF
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A measurement was requested while a calibration is being collected
    #[error("finish or cancel the calibration before measuring")]
    CalibrationInProgress,

    /// The rasterizer failed to produce a page image
    #[error("rasterization failed: {0}")]
    Raster(String),

    /// Scene JSON could not be produced or parsed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for editing operations
pub type EditorResult<T> = Result<T, EditorError>;
