//! Takeoff Core Library
//!
//! Scene model, undo history, scale calibration and measurement for the
//! PDF takeoff editor.

pub mod annotation;
pub mod calibration;
pub mod config;
pub mod csv_export;
pub mod document;
pub mod error;
pub mod history;
pub mod material;
pub mod measurement;
pub mod scene;
pub mod session;
pub mod snapping;

pub use annotation::{Color, Fill, Point, Shape, ShapeId, ShapeKind, Stroke};
pub use calibration::{
    parse_reference_length, parse_scale_ratio, Calibration, CalibrationPhase, CalibrationProgress,
};
pub use config::{ConfigError, EditorConfig};
pub use csv_export::{export_quantities_csv, CsvExportConfig, CsvExportError};
pub use document::{ensure_pdf, PageRaster, PageRasterizer, PdfLoadTask, RasterRequest};
pub use error::{EditorError, EditorResult};
pub use history::HistoryStack;
pub use material::{HatchPattern, Material};
pub use measurement::{euclidean_distance, format_distance, quantity, Quantity};
pub use scene::{Scene, SceneSnapshot};
pub use session::{EditorSession, Tool};
pub use snapping::{snap_angle, SnapIndex};
