//! Editing session
//!
//! [`EditorSession`] owns everything one open page needs: the scene, its
//! undo history, the calibration, the snap index and the active tool. UI
//! events are translated into calls on the session; the renderer reads
//! [`EditorSession::scene`] back.
//!
//! A shape being drawn (the draft) lives in the scene so it can be painted,
//! but it is only recorded in history when the gesture finishes.

use crate::annotation::{Color, Fill, Point, Shape, ShapeId, ShapeKind, Stroke};
use crate::calibration::{Calibration, CalibrationProgress};
use crate::config::EditorConfig;
use crate::document::PageRaster;
use crate::error::{EditorError, EditorResult};
use crate::history::HistoryStack;
use crate::material::Material;
use crate::measurement;
use crate::scene::Scene;
use crate::snapping::{snap_angle, SnapIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Font size of newly placed text labels
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Active tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Select,
    Rectangle,
    Circle,
    Line,
    DashedLine,
    Freehand,
    Polyline,
    Text,
    Measure,
    Calibrate,
}

impl Tool {
    /// Tools that create a shape through pointer gestures
    pub fn draws(&self) -> bool {
        matches!(
            self,
            Tool::Rectangle
                | Tool::Circle
                | Tool::Line
                | Tool::DashedLine
                | Tool::Freehand
                | Tool::Polyline
                | Tool::Measure
        )
    }
}

/// Shape currently being drawn
#[derive(Debug, Clone, Copy, PartialEq)]
struct Draft {
    id: ShapeId,
    /// Where the gesture started
    anchor: Point,
}

/// One open page and its annotations
#[derive(Debug)]
pub struct EditorSession {
    scene: Scene,
    history: HistoryStack,
    calibration: Calibration,
    snap_index: SnapIndex,
    config: EditorConfig,
    tool: Tool,
    stroke: Stroke,
    selection: Option<ShapeId>,
    draft: Option<Draft>,
    page_size: Option<(f64, f64)>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let history = match config.history_limit {
            Some(limit) => HistoryStack::with_limit(limit),
            None => HistoryStack::new(),
        };
        Self {
            scene: Scene::new(),
            history,
            calibration: Calibration::new(),
            snap_index: SnapIndex::new(),
            config,
            tool: Tool::default(),
            stroke: Stroke::default(),
            selection: None,
            draft: None,
            page_size: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn snap_index(&self) -> &SnapIndex {
        &self.snap_index
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selection(&self) -> Option<ShapeId> {
        self.selection
    }

    pub fn selected_shape(&self) -> Option<&Shape> {
        self.scene.get(self.selection?)
    }

    /// Shape being drawn, if a gesture is in progress
    pub fn draft_id(&self) -> Option<ShapeId> {
        self.draft.map(|draft| draft.id)
    }

    pub fn page_size(&self) -> Option<(f64, f64)> {
        self.page_size
    }

    /// Stroke given to newly drawn shapes
    pub fn stroke(&self) -> Stroke {
        self.stroke
    }

    pub fn set_default_stroke(&mut self, stroke: Stroke) {
        self.stroke = stroke;
    }

    /// Switch tools
    ///
    /// Any draft is abandoned. Entering [`Tool::Calibrate`] starts a new
    /// calibration; leaving it cancels one still in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        self.abandon_draft();
        if self.tool == Tool::Calibrate && tool != Tool::Calibrate {
            self.calibration.cancel();
        }
        if tool == Tool::Calibrate {
            self.calibration.begin(self.config.default_unit.clone());
        }
        debug!(from = ?self.tool, to = ?tool, "tool changed");
        self.tool = tool;
    }

    /// Register the loaded page so its corners become snap targets
    pub fn attach_page(&mut self, raster: &PageRaster) {
        self.page_size = Some(raster.size());
        self.rebuild_snap_index();
    }

    /// Pointer pressed on the canvas
    ///
    /// Starts a draft for drawing tools, adds a vertex for the polyline tool
    /// and selects for [`Tool::Select`]. Returns the draft or selected shape.
    pub fn pointer_down(&mut self, point: Point) -> Option<ShapeId> {
        let point = self.resolve_point(point);

        match self.tool {
            Tool::Select => self.select_at(point),
            Tool::Polyline => {
                if let Some(draft) = self.draft {
                    self.scene.update_shape(draft.id, |shape| {
                        if let ShapeKind::Polyline { vertices, .. } = shape.kind_mut() {
                            if let Some(last) = vertices.last_mut() {
                                *last = point;
                            }
                            vertices.push(point);
                        }
                    });
                    return Some(draft.id);
                }
                self.start_draft(point)
            }
            tool if tool.draws() => {
                self.abandon_draft();
                self.start_draft(point)
            }
            _ => None,
        }
    }

    /// Pointer dragged; updates the draft geometry
    pub fn pointer_move(&mut self, point: Point) {
        self.update_draft(point);
    }

    /// Pointer released; finalizes the draft
    ///
    /// Polylines keep collecting vertices until [`EditorSession::finish_polyline`].
    pub fn pointer_up(&mut self, point: Point) -> Option<ShapeId> {
        self.draft?;
        let point = self.resolve_point(point);
        self.update_draft(point);

        if self.tool == Tool::Polyline {
            return None;
        }
        self.finalize_draft()
    }

    /// Pointer left the canvas mid-gesture
    pub fn pointer_leave(&mut self) {
        self.abandon_draft();
    }

    /// Close the polyline being drawn
    ///
    /// Drops the rubber-band vertex that follows the pointer, then finalizes.
    pub fn finish_polyline(&mut self) -> Option<ShapeId> {
        let draft = self.draft?;
        if self.tool != Tool::Polyline {
            return None;
        }
        self.scene.update_shape(draft.id, |shape| {
            if let ShapeKind::Polyline { vertices, .. } = shape.kind_mut() {
                vertices.pop();
            }
        });
        self.finalize_draft()
    }

    /// Feed a point to the calibration started by [`Tool::Calibrate`]
    ///
    /// See [`Calibration::add_point`]. A completed calibration returns the
    /// session to [`Tool::Select`].
    pub fn calibrate<F>(&mut self, point: Point, prompt: F) -> EditorResult<CalibrationProgress>
    where
        F: FnOnce(f64) -> String,
    {
        let point = self.resolve_point(point);
        let progress = self.calibration.add_point(point, prompt)?;
        if matches!(progress, CalibrationProgress::Calibrated { .. }) {
            self.tool = Tool::Select;
        }
        Ok(progress)
    }

    /// Set the scale from a `"1:50"` style ratio in the configured unit
    pub fn set_scale_ratio(&mut self, ratio: &str) -> EditorResult<()> {
        if self.calibration.is_active() {
            return Err(EditorError::CalibrationInProgress);
        }
        self.calibration.set_scale_ratio(ratio, self.config.default_unit.clone())
    }

    /// Set the scale directly in units per pixel, e.g. from a saved project
    pub fn set_scale_factor(&mut self, scale_factor: f64, unit: &str) -> EditorResult<()> {
        if self.calibration.is_active() {
            return Err(EditorError::CalibrationInProgress);
        }
        self.calibration.set_scale_factor(scale_factor, unit)
    }

    /// Add a measurement between two points at the current scale
    ///
    /// Coincident endpoints are rejected, as a zero-length drag is.
    pub fn measure(&mut self, a: Point, b: Point) -> EditorResult<ShapeId> {
        if self.calibration.is_active() {
            warn!("measurement rejected during calibration");
            return Err(EditorError::CalibrationInProgress);
        }
        let (a, b) = (self.resolve_point(a), self.resolve_point(b));
        let kind = self.measurement_between(a, b);
        if kind.is_degenerate() {
            return Err(EditorError::InvalidInput(
                "measurement endpoints coincide".to_string(),
            ));
        }
        self.abandon_draft();
        let id = self.scene.add_shape(kind);
        self.on_shape_finalized(id);
        Ok(id)
    }

    /// Place a text label anchored at `point`
    pub fn place_text(&mut self, point: Point, content: &str) -> EditorResult<ShapeId> {
        if content.trim().is_empty() {
            return Err(EditorError::InvalidInput("text label is empty".to_string()));
        }
        self.abandon_draft();
        let id = self.scene.add_shape(ShapeKind::TextLabel {
            anchor: point,
            content: content.to_string(),
            font_size: DEFAULT_FONT_SIZE,
        });
        self.on_shape_finalized(id);
        Ok(id)
    }

    pub fn undo(&mut self) -> bool {
        self.abandon_draft();
        let changed = self.history.undo(&mut self.scene);
        if changed {
            self.after_history_step();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        self.abandon_draft();
        let changed = self.history.redo(&mut self.scene);
        if changed {
            self.after_history_step();
        }
        changed
    }

    /// Select the topmost shape under `point`, or clear the selection
    pub fn select_at(&mut self, point: Point) -> Option<ShapeId> {
        self.selection = self.scene.hit_test(&point, self.config.hit_tolerance).map(Shape::id);
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Remove the selected shape
    pub fn delete_selected(&mut self) -> EditorResult<Shape> {
        let id = self.selection.ok_or(EditorError::EmptySelection)?;
        self.abandon_draft();
        let removed = self.scene.remove_shape(id).ok_or(EditorError::EmptySelection)?;
        self.selection = None;
        self.on_scene_changed();
        Ok(removed)
    }

    pub fn set_stroke_color(&mut self, color: Color) -> EditorResult<()> {
        self.edit_selected("stroke color", |shape| shape.kind_mut().set_stroke_color(color))
    }

    pub fn set_fill(&mut self, fill: Fill) -> EditorResult<()> {
        self.edit_selected("fill", |shape| shape.kind_mut().set_fill(fill))
    }

    /// Hatch the selected closed shape with a material pattern
    pub fn apply_material(&mut self, material: Material) -> EditorResult<()> {
        self.set_fill(Fill::Pattern { material, color: Color::BLACK })
    }

    /// Rotate the selected shape to `angle` degrees
    ///
    /// With `snap` held, lines and polylines round the angle to the configured
    /// increment; other shapes take the angle as given. Returns the applied angle.
    pub fn rotate_selected(&mut self, angle: f64, snap: bool) -> EditorResult<f64> {
        let increment = self.config.angle_snap_increment;
        let mut applied = angle;
        self.edit_selected("rotation", |shape| {
            if snap && shape.kind().supports_angle_snap() {
                applied = snap_angle(angle, increment);
            }
            shape.set_rotation(applied);
            true
        })?;
        Ok(applied)
    }

    /// Scene as `{"shapes": [...]}` JSON
    pub fn export_json(&self) -> EditorResult<String> {
        self.scene.to_json()
    }

    /// Replace the scene with one read from JSON
    ///
    /// The import is recorded, so it can be undone back to the previous scene
    /// (if that scene was itself recorded). Invalid JSON leaves everything
    /// untouched.
    pub fn import_json(&mut self, json: &str) -> EditorResult<usize> {
        let scene = Scene::from_json(json)?;
        self.abandon_draft();
        self.scene = scene;
        self.selection = None;
        self.on_scene_changed();
        Ok(self.scene.len())
    }

    fn resolve_point(&self, point: Point) -> Point {
        if self.config.point_snapping {
            self.snap_index.snap(point, self.config.snap_threshold)
        } else {
            point
        }
    }

    fn measurement_between(&self, a: Point, b: Point) -> ShapeKind {
        measurement::measure(
            a,
            b,
            self.calibration.scale_factor(),
            self.calibration.unit(),
            self.config.label_offset,
        )
    }

    fn start_draft(&mut self, point: Point) -> Option<ShapeId> {
        let stroke = self.stroke;
        let kind = match self.tool {
            Tool::Rectangle => ShapeKind::Rectangle {
                origin: point,
                width: 0.0,
                height: 0.0,
                stroke,
                fill: Fill::None,
            },
            Tool::Circle => {
                ShapeKind::Circle { center: point, radius: 0.0, stroke, fill: Fill::None }
            }
            Tool::Line | Tool::DashedLine => ShapeKind::Line {
                from: point,
                to: point,
                stroke,
                dashed: self.tool == Tool::DashedLine,
            },
            Tool::Freehand => {
                ShapeKind::FreehandPath { vertices: vec![point], stroke, width: stroke.width }
            }
            Tool::Polyline => {
                ShapeKind::Polyline { vertices: vec![point, point], stroke, fill: Fill::None }
            }
            Tool::Measure => self.measurement_between(point, point),
            Tool::Select | Tool::Text | Tool::Calibrate => return None,
        };

        let id = self.scene.add_shape(kind);
        self.draft = Some(Draft { id, anchor: point });
        debug!(%id, tool = ?self.tool, "draft started");
        Some(id)
    }

    fn update_draft(&mut self, point: Point) {
        let Some(draft) = self.draft else {
            return;
        };
        let measurement = (self.tool == Tool::Measure)
            .then(|| self.measurement_between(draft.anchor, point));

        self.scene.update_shape(draft.id, |shape| {
            let kind = shape.kind_mut();
            if let Some(measurement) = measurement {
                *kind = measurement;
                return;
            }
            match kind {
                ShapeKind::Rectangle { origin, width, height, .. } => {
                    *width = point.x - origin.x;
                    *height = point.y - origin.y;
                }
                ShapeKind::Circle { center, radius, .. } => *radius = center.distance_to(&point),
                ShapeKind::Line { to, .. } => *to = point,
                ShapeKind::FreehandPath { vertices, .. } => vertices.push(point),
                ShapeKind::Polyline { vertices, .. } => {
                    if let Some(last) = vertices.last_mut() {
                        *last = point;
                    }
                }
                ShapeKind::TextLabel { .. } | ShapeKind::Measurement { .. } => {}
            }
        });
    }

    fn finalize_draft(&mut self) -> Option<ShapeId> {
        let draft = self.draft.take()?;
        let degenerate =
            self.scene.get(draft.id).map_or(true, |shape| shape.kind().is_degenerate());
        if degenerate {
            self.scene.remove_shape(draft.id);
            debug!(id = %draft.id, "discarded zero-size draft");
            return None;
        }

        self.scene.update_shape(draft.id, |shape| shape.kind_mut().normalize());
        self.on_shape_finalized(draft.id);
        Some(draft.id)
    }

    fn abandon_draft(&mut self) {
        if let Some(draft) = self.draft.take() {
            self.scene.remove_shape(draft.id);
            debug!(id = %draft.id, "draft abandoned");
        }
    }

    fn on_shape_finalized(&mut self, id: ShapeId) {
        debug!(%id, "shape finalized");
        self.on_scene_changed();
    }

    fn on_scene_changed(&mut self) {
        self.history.record(&self.scene);
        self.rebuild_snap_index();
    }

    fn after_history_step(&mut self) {
        if self.selection.is_some_and(|id| !self.scene.contains(id)) {
            self.selection = None;
        }
        self.rebuild_snap_index();
    }

    fn rebuild_snap_index(&mut self) {
        self.snap_index.rebuild(&self.scene, self.page_size);
    }

    fn edit_selected<F>(&mut self, what: &str, edit: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Shape) -> bool,
    {
        let id = self.selection.ok_or(EditorError::EmptySelection)?;
        self.abandon_draft();
        let mut applied = false;
        if !self.scene.update_shape(id, |shape| applied = edit(shape)) {
            self.selection = None;
            return Err(EditorError::EmptySelection);
        }
        if !applied {
            return Err(EditorError::InvalidInput(format!(
                "{what} does not apply to the selected shape"
            )));
        }
        self.on_scene_changed();
        Ok(())
    }
}
