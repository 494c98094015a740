//! Annotation shape model
//!
//! Plain geometric data for everything drawn on the overlay. Nothing here
//! knows how to paint; the renderer reads shapes and styles and draws them.
//! All coordinates are canvas pixels of the rasterized page.

use crate::material::Material;
use serde::{Deserialize, Serialize};

/// Unique identifier for a shape
///
/// Assigned once at creation and kept across undo/redo and save/load.
pub type ShapeId = uuid::Uuid;

/// Canvas pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// Rotate around `center` by `degrees`, clockwise on the y-down canvas
    pub fn rotate_about(&self, center: &Point, degrees: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Hex form, `#RRGGBB` for opaque colors and `#RRGGBBAA` otherwise
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => {
                let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Color::rgb(digits.next()??, digits.next()??, digits.next()??))
            }
            6 => Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Color::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
}

/// Outline style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    /// Width in pixels
    pub width: f64,
}

impl Stroke {
    pub fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

impl Default for Stroke {
    fn default() -> Self {
        Self { color: Color::RED, width: 2.0 }
    }
}

/// Interior style for closed shapes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fill {
    #[default]
    None,
    Solid { color: Color },
    /// Material hatch drawn in `color`
    Pattern { material: Material, color: Color },
}

/// Geometry and style of a shape, one variant per drawing tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle {
        origin: Point,
        width: f64,
        height: f64,
        stroke: Stroke,
        #[serde(default)]
        fill: Fill,
    },
    Circle {
        center: Point,
        radius: f64,
        stroke: Stroke,
        #[serde(default)]
        fill: Fill,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
        #[serde(default)]
        dashed: bool,
    },
    Polyline {
        vertices: Vec<Point>,
        stroke: Stroke,
        #[serde(default)]
        fill: Fill,
    },
    /// Freehand cloud or sketch stroke
    FreehandPath {
        vertices: Vec<Point>,
        stroke: Stroke,
        width: f64,
    },
    TextLabel {
        anchor: Point,
        content: String,
        font_size: f64,
    },
    /// Calibrated distance between two points
    Measurement {
        from: Point,
        to: Point,
        pixel_distance: f64,
        real_distance: f64,
        unit_label: String,
        /// Where the renderer places the distance label
        label_anchor: Point,
    },
}

impl ShapeKind {
    /// Name used in exports, matches the serialized `type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle { .. } => "rectangle",
            ShapeKind::Circle { .. } => "circle",
            ShapeKind::Line { .. } => "line",
            ShapeKind::Polyline { .. } => "polyline",
            ShapeKind::FreehandPath { .. } => "freehand_path",
            ShapeKind::TextLabel { .. } => "text_label",
            ShapeKind::Measurement { .. } => "measurement",
        }
    }

    /// Bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        match self {
            ShapeKind::Rectangle { origin, width, height, .. } => {
                let far = origin.offset(*width, *height);
                (origin.x.min(far.x), origin.y.min(far.y), origin.x.max(far.x), origin.y.max(far.y))
            }
            ShapeKind::Circle { center, radius, .. } => {
                (center.x - radius, center.y - radius, center.x + radius, center.y + radius)
            }
            ShapeKind::Line { from, to, .. } | ShapeKind::Measurement { from, to, .. } => {
                (from.x.min(to.x), from.y.min(to.y), from.x.max(to.x), from.y.max(to.y))
            }
            ShapeKind::Polyline { vertices, .. } | ShapeKind::FreehandPath { vertices, .. } => {
                let Some(first) = vertices.first() else {
                    return (0.0, 0.0, 0.0, 0.0);
                };
                vertices.iter().skip(1).fold(
                    (first.x, first.y, first.x, first.y),
                    |(min_x, min_y, max_x, max_y), p| {
                        (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
                    },
                )
            }
            ShapeKind::TextLabel { anchor, content, font_size } => {
                // Rough estimate, real extent depends on the font
                let width = content.chars().count() as f64 * font_size * 0.6;
                (anchor.x, anchor.y - font_size, anchor.x + width, anchor.y)
            }
        }
    }

    /// Check if a point is on (or inside, for text) this shape within tolerance
    pub fn contains_point(&self, point: &Point, tolerance: f64) -> bool {
        match self {
            ShapeKind::Line { from, to, .. } | ShapeKind::Measurement { from, to, .. } => {
                point_near_segment(point, from, to, tolerance)
            }
            ShapeKind::Polyline { vertices, .. } | ShapeKind::FreehandPath { vertices, .. } => {
                if vertices.len() == 1 {
                    return point.distance_to(&vertices[0]) <= tolerance;
                }
                vertices
                    .windows(2)
                    .any(|pair| point_near_segment(point, &pair[0], &pair[1], tolerance))
            }
            ShapeKind::Rectangle { fill, .. } => {
                let (min_x, min_y, max_x, max_y) = self.bounding_box();
                let inside_outer = point.x >= min_x - tolerance
                    && point.x <= max_x + tolerance
                    && point.y >= min_y - tolerance
                    && point.y <= max_y + tolerance;
                if *fill != Fill::None {
                    return inside_outer;
                }
                let inside_inner = point.x > min_x + tolerance
                    && point.x < max_x - tolerance
                    && point.y > min_y + tolerance
                    && point.y < max_y - tolerance;
                inside_outer && !inside_inner
            }
            ShapeKind::Circle { center, radius, fill, .. } => {
                let dist = point.distance_to(center);
                if *fill != Fill::None {
                    dist <= radius + tolerance
                } else {
                    (dist - radius).abs() <= tolerance
                }
            }
            ShapeKind::TextLabel { .. } => {
                let (min_x, min_y, max_x, max_y) = self.bounding_box();
                point.x >= min_x && point.x <= max_x && point.y >= min_y && point.y <= max_y
            }
        }
    }

    /// Points other geometry can snap to: corners, endpoints, vertices, centers
    pub fn snap_points(&self) -> Vec<Point> {
        match self {
            ShapeKind::Rectangle { origin, width, height, .. } => vec![
                *origin,
                origin.offset(*width, 0.0),
                origin.offset(*width, *height),
                origin.offset(0.0, *height),
            ],
            ShapeKind::Circle { center, .. } => vec![*center],
            ShapeKind::Line { from, to, .. } | ShapeKind::Measurement { from, to, .. } => {
                vec![*from, *to]
            }
            ShapeKind::Polyline { vertices, .. } => vertices.clone(),
            ShapeKind::FreehandPath { vertices, .. } => {
                vertices.first().into_iter().chain(vertices.last()).copied().collect()
            }
            ShapeKind::TextLabel { anchor, .. } => vec![*anchor],
        }
    }

    /// True when the shape has no visible extent (a click without a drag)
    pub fn is_degenerate(&self) -> bool {
        const EPSILON: f64 = 1e-6;
        match self {
            ShapeKind::Rectangle { width, height, .. } => {
                width.abs() < EPSILON || height.abs() < EPSILON
            }
            ShapeKind::Circle { radius, .. } => *radius < EPSILON,
            ShapeKind::Line { from, to, .. } | ShapeKind::Measurement { from, to, .. } => {
                from.distance_to(to) < EPSILON
            }
            ShapeKind::Polyline { vertices, .. } | ShapeKind::FreehandPath { vertices, .. } => {
                vertices.windows(2).all(|pair| pair[0].distance_to(&pair[1]) < EPSILON)
            }
            ShapeKind::TextLabel { content, .. } => content.trim().is_empty(),
        }
    }

    /// Flip negative width/height so `origin` is the top-left corner
    pub fn normalize(&mut self) {
        if let ShapeKind::Rectangle { origin, width, height, .. } = self {
            if *width < 0.0 {
                origin.x += *width;
                *width = -*width;
            }
            if *height < 0.0 {
                origin.y += *height;
                *height = -*height;
            }
        }
    }

    /// Replace the stroke color; returns false for kinds without a stroke
    pub fn set_stroke_color(&mut self, color: Color) -> bool {
        match self {
            ShapeKind::Rectangle { stroke, .. }
            | ShapeKind::Circle { stroke, .. }
            | ShapeKind::Line { stroke, .. }
            | ShapeKind::Polyline { stroke, .. }
            | ShapeKind::FreehandPath { stroke, .. } => {
                stroke.color = color;
                true
            }
            ShapeKind::TextLabel { .. } | ShapeKind::Measurement { .. } => false,
        }
    }

    /// Replace the fill; returns false for open shapes
    pub fn set_fill(&mut self, new_fill: Fill) -> bool {
        match self {
            ShapeKind::Rectangle { fill, .. }
            | ShapeKind::Circle { fill, .. }
            | ShapeKind::Polyline { fill, .. } => {
                *fill = new_fill;
                true
            }
            _ => false,
        }
    }

    pub fn fill(&self) -> Option<&Fill> {
        match self {
            ShapeKind::Rectangle { fill, .. }
            | ShapeKind::Circle { fill, .. }
            | ShapeKind::Polyline { fill, .. } => Some(fill),
            _ => None,
        }
    }

    /// Lines and polylines snap their rotation to fixed increments
    pub fn supports_angle_snap(&self) -> bool {
        matches!(self, ShapeKind::Line { .. } | ShapeKind::Polyline { .. })
    }
}

fn point_near_segment(point: &Point, start: &Point, end: &Point, tolerance: f64) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        return point.distance_to(start) <= tolerance;
    }

    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    let closest = Point::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// A shape in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    id: ShapeId,
    #[serde(flatten)]
    kind: ShapeKind,
    /// Rotation around the shape's bounding-box center, in degrees
    #[serde(default)]
    rotation: f64,
}

impl Shape {
    /// Create a shape with a freshly generated ID
    pub fn new(kind: ShapeKind) -> Self {
        Self::with_id(ShapeId::new_v4(), kind)
    }

    pub fn with_id(id: ShapeId, kind: ShapeKind) -> Self {
        Self { id, kind, rotation: 0.0 }
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ShapeKind {
        &mut self.kind
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
    }

    /// Center of the unrotated bounding box, which rotation turns around
    pub fn pivot(&self) -> Point {
        let (min_x, min_y, max_x, max_y) = self.kind.bounding_box();
        Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
    }

    /// Axis-aligned bounds of the shape as drawn, rotation included
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let bounds = self.kind.bounding_box();
        if self.rotation == 0.0 {
            return bounds;
        }

        let (min_x, min_y, max_x, max_y) = bounds;
        let outline = match &self.kind {
            // A circle turns around its own center
            ShapeKind::Circle { .. } => return bounds,
            ShapeKind::Line { from, to, .. } | ShapeKind::Measurement { from, to, .. } => {
                vec![*from, *to]
            }
            ShapeKind::Polyline { vertices, .. } | ShapeKind::FreehandPath { vertices, .. } => {
                vertices.clone()
            }
            ShapeKind::Rectangle { .. } | ShapeKind::TextLabel { .. } => vec![
                Point::new(min_x, min_y),
                Point::new(max_x, min_y),
                Point::new(max_x, max_y),
                Point::new(min_x, max_y),
            ],
        };

        self.rotated(outline).into_iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        )
    }

    /// Hit test against the shape as drawn
    ///
    /// The point is turned back into the shape's unrotated frame, so the
    /// per-kind geometry tests apply unchanged.
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> bool {
        if self.rotation == 0.0 {
            return self.kind.contains_point(point, tolerance);
        }
        let local = point.rotate_about(&self.pivot(), -self.rotation);
        self.kind.contains_point(&local, tolerance)
    }

    /// Snap points where the shape is drawn, rotation included
    pub fn snap_points(&self) -> Vec<Point> {
        self.rotated(self.kind.snap_points())
    }

    fn rotated(&self, points: Vec<Point>) -> Vec<Point> {
        if self.rotation == 0.0 {
            return points;
        }
        let pivot = self.pivot();
        points.iter().map(|point| point.rotate_about(&pivot, self.rotation)).collect()
    }
}
