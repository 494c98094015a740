//! Scene model
//!
//! The scene is the authoritative, ordered list of shapes for the open page.
//! Insertion order is paint order. Rendering is a read-only projection done
//! by an external renderer over [`Scene::iter`].

use crate::annotation::{Point, Shape, ShapeId, ShapeKind};
use crate::error::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Immutable copy of the whole scene at one edit boundary
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    shapes: Arc<[Shape]>,
}

impl SceneSnapshot {
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Serialize to the persisted `{"shapes": [...]}` layout
    pub fn to_json(&self) -> EditorResult<String> {
        let document = SceneDocumentRef { shapes: &self.shapes };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[derive(Serialize)]
struct SceneDocumentRef<'a> {
    shapes: &'a [Shape],
}

#[derive(Deserialize)]
struct SceneDocument {
    shapes: Vec<Shape>,
}

/// Ordered collection of shapes owned by one editing session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    shapes: Vec<Shape>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene holding `shapes` in the given paint order
    pub fn from_shapes(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Append a new shape and return its fresh ID
    ///
    /// Does not record history; the caller records once the edit is final.
    pub fn add_shape(&mut self, kind: ShapeKind) -> ShapeId {
        let shape = Shape::new(kind);
        let id = shape.id();
        self.shapes.push(shape);
        id
    }

    /// Apply a change to the shape with the given ID
    ///
    /// Returns false without doing anything when the ID is not in the scene,
    /// e.g. because an undo removed the shape.
    pub fn update_shape<F>(&mut self, id: ShapeId, mutator: F) -> bool
    where
        F: FnOnce(&mut Shape),
    {
        match self.shapes.iter_mut().find(|shape| shape.id() == id) {
            Some(shape) => {
                mutator(shape);
                true
            }
            None => false,
        }
    }

    /// Remove a shape by ID; no-op if absent
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let index = self.shapes.iter().position(|shape| shape.id() == id)?;
        Some(self.shapes.remove(index))
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|shape| shape.id() == id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.get(id).is_some()
    }

    /// Shapes in paint order
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Topmost shape under the point, if any
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> Option<&Shape> {
        self.shapes.iter().rev().find(|shape| shape.hit_test(point, tolerance))
    }

    /// Deep copy of all shapes
    pub fn serialize(&self) -> SceneSnapshot {
        SceneSnapshot { shapes: Arc::from(self.shapes.as_slice()) }
    }

    /// Replace every shape with a deep copy of the snapshot's contents
    pub fn restore(&mut self, snapshot: &SceneSnapshot) {
        self.shapes = snapshot.shapes.to_vec();
    }

    /// Serialize to the persisted `{"shapes": [...]}` layout
    pub fn to_json(&self) -> EditorResult<String> {
        self.serialize().to_json()
    }

    /// Parse the persisted layout produced by [`Scene::to_json`]
    ///
    /// Shape IDs must be unique; a file listing one ID twice is rejected.
    pub fn from_json(json: &str) -> EditorResult<Scene> {
        let document: SceneDocument = serde_json::from_str(json)?;

        let mut seen = HashSet::with_capacity(document.shapes.len());
        if let Some(shape) = document.shapes.iter().find(|shape| !seen.insert(shape.id())) {
            return Err(EditorError::InvalidInput(format!("duplicate shape id {}", shape.id())));
        }

        Ok(Scene { shapes: document.shapes })
    }
}
