//! Snapping helpers
//!
//! Two independent aids: rotation angles rounded to a fixed increment while
//! a modifier key is held, and pointer positions pulled onto nearby page
//! corners or shape endpoints.

use crate::annotation::Point;
use crate::scene::Scene;

/// Round an angle to the nearest multiple of `increment` (both in degrees)
///
/// Uses `round`, not `floor`: `snap_angle(37.0, 15.0) == 30.0` but
/// `snap_angle(38.0, 15.0) == 45.0`, and `snap_angle(53.0, 15.0) == 60.0`.
/// A non-positive increment returns the angle unchanged.
pub fn snap_angle(angle: f64, increment: f64) -> f64 {
    if increment <= 0.0 || !increment.is_finite() {
        return angle;
    }
    (angle / increment).round() * increment
}

/// Flat list of points the pointer can snap to
///
/// Holds the page corners (once a page is attached) and the snap points of
/// every shape. Rebuilt from scratch after each scene change; lookups are a
/// linear scan, which is fine for the handful of shapes on one page but grows
/// with shapes × points.
#[derive(Debug, Clone, Default)]
pub struct SnapIndex {
    points: Vec<Point>,
}

impl SnapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the point list from the page size and the scene
    pub fn rebuild(&mut self, scene: &Scene, page_size: Option<(f64, f64)>) {
        self.points.clear();

        if let Some((width, height)) = page_size {
            self.points.extend([
                Point::new(0.0, 0.0),
                Point::new(width, 0.0),
                Point::new(width, height),
                Point::new(0.0, height),
            ]);
        }

        for shape in scene.iter() {
            self.points.extend(shape.snap_points());
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest snap point within `threshold`, if any
    pub fn nearest(&self, point: &Point, threshold: f64) -> Option<Point> {
        let mut best: Option<(Point, f64)> = None;
        for candidate in &self.points {
            let distance = candidate.distance_to(point);
            if distance > threshold {
                continue;
            }
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((*candidate, distance));
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// The nearest snap point within `threshold`, or `point` unchanged
    pub fn snap(&self, point: Point, threshold: f64) -> Point {
        self.nearest(&point, threshold).unwrap_or(point)
    }
}
