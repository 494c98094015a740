//! Distance measurement and quantity take-off
//!
//! Pixel geometry is converted to real-world units with the scale factor
//! produced by calibration (`units per pixel`). Lengths scale linearly,
//! areas with the square of the factor.

use crate::annotation::{Fill, Point, ShapeKind};
use std::f64::consts::PI;

/// Straight-line distance between two points in pixels
pub fn euclidean_distance(a: &Point, b: &Point) -> f64 {
    a.distance_to(b)
}

/// Real-world distance with two decimals, e.g. `"100.00"`
pub fn format_distance(real_distance: f64) -> String {
    format!("{:.2}", real_distance)
}

/// Distance followed by the unit suffix, e.g. `"100.00 m"`
pub fn format_label(real_distance: f64, unit: &str) -> String {
    if unit.is_empty() {
        format_distance(real_distance)
    } else {
        format!("{} {}", format_distance(real_distance), unit)
    }
}

/// Where a measurement label goes: above the midpoint of the measured line
///
/// Canvas Y grows downward, so "above" subtracts `offset`.
pub fn label_anchor(a: &Point, b: &Point, offset: f64) -> Point {
    a.midpoint(b).offset(0.0, -offset)
}

/// Build a measurement shape between two points
pub fn measure(a: Point, b: Point, scale_factor: f64, unit: &str, label_offset: f64) -> ShapeKind {
    let pixel_distance = euclidean_distance(&a, &b);
    ShapeKind::Measurement {
        from: a,
        to: b,
        pixel_distance,
        real_distance: pixel_distance * scale_factor,
        unit_label: unit.to_string(),
        label_anchor: label_anchor(&a, &b, label_offset),
    }
}

/// Label text of a measurement shape, `None` for other kinds
pub fn measurement_label(kind: &ShapeKind) -> Option<String> {
    match kind {
        ShapeKind::Measurement { real_distance, unit_label, .. } => {
            Some(format_label(*real_distance, unit_label))
        }
        _ => None,
    }
}

/// Total length of an open path in pixels
pub fn path_length(vertices: &[Point]) -> f64 {
    vertices.windows(2).map(|pair| pair[0].distance_to(&pair[1])).sum()
}

/// Area enclosed by a closed polygon in square pixels (shoelace formula)
pub fn polygon_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += vertices[i].x * vertices[j].y;
        area -= vertices[j].x * vertices[i].y;
    }
    (area / 2.0).abs()
}

/// Real-world quantities of one shape
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quantity {
    /// Length of open geometry (lines, paths, measurements)
    pub length: Option<f64>,
    /// Outline length of closed geometry
    pub perimeter: Option<f64>,
    /// Enclosed area in square units
    pub area: Option<f64>,
}

impl Quantity {
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.perimeter.is_none() && self.area.is_none()
    }
}

/// Take off the quantities of a shape at the given scale factor
///
/// Polylines count as closed when they carry a fill. Measurements report the
/// distance computed when they were placed; text has no quantities.
pub fn quantity(kind: &ShapeKind, scale_factor: f64) -> Quantity {
    let linear = |pixels: f64| pixels * scale_factor;
    let square = |pixels: f64| pixels * scale_factor * scale_factor;

    match kind {
        ShapeKind::Rectangle { width, height, .. } => {
            let (w, h) = (width.abs(), height.abs());
            Quantity {
                length: None,
                perimeter: Some(linear(2.0 * (w + h))),
                area: Some(square(w * h)),
            }
        }
        ShapeKind::Circle { radius, .. } => Quantity {
            length: None,
            perimeter: Some(linear(2.0 * PI * radius)),
            area: Some(square(PI * radius * radius)),
        },
        ShapeKind::Line { from, to, .. } => {
            Quantity { length: Some(linear(from.distance_to(to))), ..Quantity::default() }
        }
        ShapeKind::Polyline { vertices, fill, .. } if *fill != Fill::None => {
            let closing = match (vertices.first(), vertices.last()) {
                (Some(first), Some(last)) => last.distance_to(first),
                _ => 0.0,
            };
            Quantity {
                length: None,
                perimeter: Some(linear(path_length(vertices) + closing)),
                area: Some(square(polygon_area(vertices))),
            }
        }
        ShapeKind::Polyline { vertices, .. } | ShapeKind::FreehandPath { vertices, .. } => {
            Quantity { length: Some(linear(path_length(vertices))), ..Quantity::default() }
        }
        ShapeKind::Measurement { real_distance, .. } => {
            Quantity { length: Some(*real_distance), ..Quantity::default() }
        }
        ShapeKind::TextLabel { .. } => Quantity::default(),
    }
}
