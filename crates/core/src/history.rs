//! Linear undo/redo over scene snapshots
//!
//! One snapshot is recorded per completed edit (a finalized shape, a style
//! change, a deletion). Intermediate drag frames are never recorded.

use crate::scene::{Scene, SceneSnapshot};
use tracing::debug;

/// Snapshot stack with a cursor
///
/// `index` is `None` until the first [`HistoryStack::record`]; afterwards it
/// always points inside `snapshots`.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    snapshots: Vec<SceneSnapshot>,
    index: Option<usize>,
    /// Maximum number of retained snapshots (None = unbounded)
    limit: Option<usize>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack that keeps at most `limit` snapshots
    ///
    /// A limit of zero is treated as one.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit.max(1)), ..Self::default() }
    }

    /// Record the current scene as the new tip
    ///
    /// Anything after the current index (redo history) is discarded. An
    /// unchanged scene still pushes a duplicate snapshot.
    pub fn record(&mut self, scene: &Scene) {
        let snapshot = scene.serialize();
        let keep = self.index.map_or(0, |index| index + 1);
        let discarded = self.snapshots.len() - keep;
        self.snapshots.truncate(keep);
        self.snapshots.push(snapshot);

        if let Some(limit) = self.limit {
            if self.snapshots.len() > limit {
                let overflow = self.snapshots.len() - limit;
                self.snapshots.drain(..overflow);
            }
        }

        self.index = Some(self.snapshots.len() - 1);
        debug!(
            shapes = scene.len(),
            index = self.snapshots.len() - 1,
            discarded,
            "recorded history snapshot"
        );
    }

    /// Step back one snapshot and restore it into `scene`
    ///
    /// Returns false (scene untouched) when already at the first snapshot or
    /// when nothing has been recorded.
    pub fn undo(&mut self, scene: &mut Scene) -> bool {
        match self.index {
            Some(index) if index > 0 => {
                self.index = Some(index - 1);
                scene.restore(&self.snapshots[index - 1]);
                debug!(index = index - 1, "undo");
                true
            }
            _ => false,
        }
    }

    /// Step forward one snapshot and restore it into `scene`
    ///
    /// Returns false (scene untouched) when already at the tip.
    pub fn redo(&mut self, scene: &mut Scene) -> bool {
        match self.index {
            Some(index) if index + 1 < self.snapshots.len() => {
                self.index = Some(index + 1);
                scene.restore(&self.snapshots[index + 1]);
                debug!(index = index + 1, "redo");
                true
            }
            _ => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(index) if index > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.index, Some(index) if index + 1 < self.snapshots.len())
    }

    /// Current position, `None` before the first record
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot at the current index
    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.snapshots.get(self.index?)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Forget everything, back to the "nothing recorded" state
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.index = None;
    }
}
