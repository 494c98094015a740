//! CSV export of take-off quantities
//!
//! One row per shape in paint order, with lengths and areas converted to
//! real-world units at the session's calibrated scale.

use crate::annotation::ShapeKind;
use crate::calibration::Calibration;
use crate::measurement::{format_distance, measurement_label, quantity};
use crate::scene::Scene;
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self { include_headers: true, delimiter: b',' }
    }
}

/// Column headers, in row order
pub const QUANTITY_HEADERS: [&str; 8] =
    ["ID", "Type", "Length", "Perimeter", "Area", "Unit", "Area Unit", "Label"];

/// Export a quantity schedule for every shape in the scene
///
/// CSV columns:
/// - ID: Shape identifier
/// - Type: Shape type (`rectangle`, `line`, `measurement`, ...)
/// - Length: Real-world length of open geometry, two decimals
/// - Perimeter: Real-world outline of closed geometry
/// - Area: Real-world enclosed area (square units)
/// - Unit: Calibrated unit, or the unit stored on a measurement
/// - Area Unit: Squared unit, only on rows with an area
/// - Label: Measurement label or text content
///
/// Empty cells mean the quantity does not apply to that shape.
pub fn export_quantities_csv<W: Write>(
    writer: W,
    scene: &Scene,
    calibration: &Calibration,
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record(QUANTITY_HEADERS)?;
    }

    for shape in scene.iter() {
        let kind = shape.kind();
        let amounts = quantity(kind, calibration.scale_factor());

        let unit = match kind {
            ShapeKind::Measurement { unit_label, .. } => unit_label.as_str(),
            ShapeKind::TextLabel { .. } => "",
            _ => calibration.unit(),
        };
        let label = match kind {
            ShapeKind::TextLabel { content, .. } => content.clone(),
            _ => measurement_label(kind).unwrap_or_default(),
        };

        let area_unit = match amounts.area {
            Some(_) => format!("{unit}²"),
            None => String::new(),
        };

        csv_writer.write_record(&[
            shape.id().to_string(),
            kind.type_name().to_string(),
            cell(amounts.length),
            cell(amounts.perimeter),
            cell(amounts.area),
            unit.to_string(),
            area_unit,
            label,
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(format_distance).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Fill, Point, Stroke};
    use crate::measurement::measure;

    fn export(scene: &Scene, calibration: &Calibration, config: &CsvExportConfig) -> String {
        let mut output = Vec::new();
        export_quantities_csv(&mut output, scene, calibration, config).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn sample_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_shape(ShapeKind::Rectangle {
            origin: Point::ORIGIN,
            width: 100.0,
            height: 40.0,
            stroke: Stroke::default(),
            fill: Fill::None,
        });
        scene.add_shape(measure(Point::ORIGIN, Point::new(40.0, 0.0), 2.5, "m", 10.0));
        scene.add_shape(ShapeKind::TextLabel {
            anchor: Point::new(5.0, 5.0),
            content: "Slab, level 2".to_string(),
            font_size: 12.0,
        });
        scene
    }

    #[test]
    fn test_export_quantities_with_headers() {
        let scene = sample_scene();
        let mut calibration = Calibration::new();
        calibration.set_scale_factor(0.5, "m").unwrap();

        let csv = export(&scene, &calibration, &CsvExportConfig::default());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "ID,Type,Length,Perimeter,Area,Unit,Area Unit,Label");
        assert!(lines[1].ends_with(",rectangle,,140.00,1000.00,m,m²,"));
        assert!(lines[2].ends_with(",measurement,100.00,,,m,,100.00 m"));
        assert!(lines[3].ends_with(",text_label,,,,,,\"Slab, level 2\""));
    }

    #[test]
    fn test_export_without_headers() {
        let scene = sample_scene();
        let config = CsvExportConfig { include_headers: false, ..CsvExportConfig::default() };

        let csv = export(&scene, &Calibration::new(), &config);
        assert_eq!(csv.lines().count(), 3);
        assert!(!csv.contains("Perimeter"));
        assert!(csv.lines().next().unwrap().ends_with(",rectangle,,280.00,4000.00,px,px²,"));
    }

    #[test]
    fn test_custom_delimiter() {
        let scene = sample_scene();
        let config = CsvExportConfig { delimiter: b';', ..CsvExportConfig::default() };

        let csv = export(&scene, &Calibration::new(), &config);
        assert!(csv.starts_with("ID;Type;Length;Perimeter;Area;Unit;Area Unit;Label"));
        assert!(csv.contains(";text_label;;;;;;Slab, level 2"));
    }

    #[test]
    fn test_empty_scene() {
        let csv = export(&Scene::new(), &Calibration::new(), &CsvExportConfig::default());
        assert_eq!(csv.lines().count(), 1);
    }
}
