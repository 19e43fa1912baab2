//! Gesture orchestration for one terrain.
//!
//! A gesture runs from the first stroke sample to `end_gesture`. While it runs
//! the session keeps a "before" image of every cell the gesture has touched so
//! far; ending the gesture compares it with the live grid and hands one record
//! to the undo sink.

use std::fmt;
use std::mem;

use bevy::prelude::*;

use crate::affected_area::AffectedArea;
use crate::alpha_edit::paint_layer;
use crate::brush::{BrushMask, BrushPlacement};
use crate::edit::EditingTool;
use crate::error::TerrainEditResult;
use crate::height_edit::{paint_heights, HeightBrushOp};
use crate::raster::{GridPatch, IndexRect};
use crate::smooth::smooth_heights;
use crate::terrain::{GridTarget, TerrainChange, TerrainData};
use crate::undo::{TerrainEditRecord, UndoSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeListener = Box<dyn FnMut(&TerrainChange) + Send + Sync>;

/// Observers told about every stroke that changed at least one cell.
#[derive(Default)]
pub struct ChangeListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, ChangeListener)>,
}

impl ChangeListeners {
    pub fn subscribe(&mut self, listener: impl FnMut(&TerrainChange) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let count = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != count
    }

    pub fn notify(&mut self, change: &TerrainChange) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Height and layer weights under a point, read without editing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeDropSample {
    pub height: f32,
    pub layer_weights: Vec<f32>,
}

#[derive(Debug)]
struct Gesture {
    target: GridTarget,
    generation: u64,
    shape: (usize, usize, usize),
    before: GridPatch,
}

impl Gesture {
    fn begin(terrain: &TerrainData, target: GridTarget, rect: &IndexRect) -> Self {
        Self {
            target,
            generation: terrain.generation(),
            shape: terrain.grid_shape(target),
            before: terrain.get_window(target, rect),
        }
    }

    /// Still editing the grid allocation it was started on.
    fn matches(&self, terrain: &TerrainData) -> bool {
        self.generation == terrain.generation() && self.shape == terrain.grid_shape(self.target)
    }

    /// Widens the before image to cover `rect`. Cells already captured keep
    /// the values they had when the gesture first touched them.
    fn track(&mut self, terrain: &TerrainData, rect: &IndexRect) {
        let covered = self.before.rect();
        if covered.contains_rect(rect) {
            return;
        }

        let mut grown = terrain.get_window(self.target, &covered.union(rect));
        grown.overlay(&self.before);
        self.before = grown;
    }
}

#[derive(Debug, Default)]
enum GestureState {
    #[default]
    Idle,
    Editing(Gesture),
}

/// Drives brush strokes on a terrain and batches them into undo records.
#[derive(Component, Debug, Default)]
pub struct EditSession {
    state: GestureState,
    listeners: ChangeListeners,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, GestureState::Editing(_))
    }

    /// Grid the running gesture edits.
    pub fn gesture_target(&self) -> Option<GridTarget> {
        match &self.state {
            GestureState::Editing(gesture) => Some(gesture.target),
            GestureState::Idle => None,
        }
    }

    /// Union of every area the running gesture has touched.
    pub fn touched_region(&self) -> Option<IndexRect> {
        match &self.state {
            GestureState::Editing(gesture) => Some(gesture.before.rect()),
            GestureState::Idle => None,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TerrainChange) + Send + Sync + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }

    /// Tells the listeners about a change made outside a stroke, such as an undo.
    pub fn notify_change(&mut self, change: &TerrainChange) {
        self.listeners.notify(change);
    }

    /// Applies one stroke sample.
    ///
    /// Every argument is checked before anything is mutated, so an error leaves
    /// both the grid and the gesture as they were. Returns the change when at
    /// least one cell moved.
    pub fn stroke(
        &mut self,
        terrain: &mut TerrainData,
        tool: &EditingTool,
        placement: &BrushPlacement,
        mask: &BrushMask,
        undo: &mut dyn UndoSink,
    ) -> TerrainEditResult<Option<TerrainChange>> {
        tool.validate(terrain.layer_count())?;
        let target = tool.target();
        let area = AffectedArea::resolve(placement, terrain.max_index(target))?;
        let rect = area.rect();

        let (stale, switching) = match &self.state {
            GestureState::Editing(gesture) => (!gesture.matches(terrain), gesture.target != target),
            GestureState::Idle => (false, false),
        };
        if stale {
            warn!("terrain grid changed during a gesture, discarding its undo snapshot");
            self.state = GestureState::Idle;
        } else if switching {
            self.end_gesture(terrain, undo);
        }

        match &mut self.state {
            GestureState::Editing(gesture) => gesture.track(terrain, &rect),
            GestureState::Idle => {
                debug!("terrain gesture started with {}", tool);
                self.state = GestureState::Editing(Gesture::begin(terrain, target, &rect));
            }
        }

        let changed = match tool {
            EditingTool::RaiseLower { delta } => {
                let mut patch = terrain.get_heights(&rect);
                let changed = paint_heights(&mut patch, &area, mask, HeightBrushOp::Delta(*delta));
                if changed > 0 {
                    terrain.set_heights(&patch)?;
                }
                changed
            }
            EditingTool::SetHeight { target: height, delta } => {
                let mut patch = terrain.get_heights(&rect);
                let op = HeightBrushOp::TowardTarget {
                    delta: *delta,
                    target: *height,
                };
                let changed = paint_heights(&mut patch, &area, mask, op);
                if changed > 0 {
                    terrain.set_heights(&patch)?;
                }
                changed
            }
            EditingTool::Smooth(settings) => {
                let read = terrain.get_heights(&settings.read_region(&rect, &terrain.bounds(GridTarget::Heights)));
                let mut patch = terrain.get_heights(&rect);
                let changed = smooth_heights(&read, &mut patch, &area, mask, settings);
                if changed > 0 {
                    terrain.set_heights(&patch)?;
                }
                changed
            }
            EditingTool::PaintLayer(paint) => {
                let mut patch = terrain.get_alpha_layers(&rect);
                let changed = paint_layer(&mut patch, &area, mask, paint)?;
                if changed > 0 {
                    terrain.set_alpha_layers(&patch)?;
                }
                changed
            }
        };

        if changed == 0 {
            return Ok(None);
        }

        let change = TerrainChange { target, rect };
        self.listeners.notify(&change);
        Ok(Some(change))
    }

    /// Finishes the running gesture. Returns true when a record was submitted.
    pub fn end_gesture(&mut self, terrain: &TerrainData, undo: &mut dyn UndoSink) -> bool {
        let GestureState::Editing(gesture) = mem::take(&mut self.state) else {
            return false;
        };

        if !gesture.matches(terrain) {
            warn!(
                "terrain {:?} grid changed during a gesture, no undo record kept",
                gesture.target
            );
            return false;
        }

        let after = terrain.get_window(gesture.target, &gesture.before.rect());
        if after == gesture.before {
            debug!("terrain gesture ended without a net change");
            return false;
        }

        debug!(
            "terrain gesture on {:?} ended, {} cells recorded",
            gesture.target,
            after.rect().cell_count()
        );
        undo.submit(TerrainEditRecord {
            target: gesture.target,
            generation: gesture.generation,
            before: gesture.before,
            after,
        });
        true
    }

    /// Drops the running gesture without recording it. Edits already applied
    /// stay on the grid.
    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.is_editing();
        self.state = GestureState::Idle;
        cancelled
    }

    /// Forgets the gesture and every listener.
    pub fn teardown(&mut self) {
        self.cancel_gesture();
        self.listeners.clear();
    }

    /// Reads the nearest height and layer weights under `center`.
    pub fn eyedrop(terrain: &TerrainData, center: Vec2) -> TerrainEditResult<EyeDropSample> {
        BrushPlacement::new(center, 0.0).validate()?;

        let nearest = |max_index: (usize, usize)| {
            (
                (center.x * max_index.0 as f32).round() as usize,
                (center.y * max_index.1 as f32).round() as usize,
            )
        };

        let (hx, hy) = nearest(terrain.max_index(GridTarget::Heights));
        let (ax, ay) = nearest(terrain.max_index(GridTarget::Alphamap));

        Ok(EyeDropSample {
            height: terrain.heights().get(hx, hy),
            layer_weights: terrain.alphamap().weights(ax, ay).to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::alpha_edit::LayerPaint;
    use crate::error::TerrainEditError;
    use crate::heightmap::HeightGrid;
    use crate::smooth::SmoothSettings;
    use crate::terrain_config::TerrainConfig;

    fn terrain() -> TerrainData {
        let config = TerrainConfig::default()
            .set_heightmap_resolution(11, 11)
            .set_alphamap_resolution(11, 11)
            .set_alphamap_layers(3)
            .set_initial_height(0.5);
        TerrainData::new(&config).unwrap()
    }

    fn raise(delta: f32) -> EditingTool {
        EditingTool::RaiseLower { delta }
    }

    fn at(x: f32, y: f32, size: f32) -> BrushPlacement {
        BrushPlacement::new(Vec2::new(x, y), size)
    }

    #[test]
    fn test_gesture_batches_into_one_record() {
        let mut terrain = terrain();
        let original = terrain.clone();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let mask = BrushMask::solid();

        session
            .stroke(&mut terrain, &raise(0.1), &at(0.25, 0.25, 0.25), &mask, &mut records)
            .unwrap();
        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.25), &mask, &mut records)
            .unwrap();
        session
            .stroke(&mut terrain, &raise(0.1), &at(0.25, 0.25, 0.25), &mask, &mut records)
            .unwrap();
        assert!(session.is_editing());
        assert!(records.is_empty());

        assert!(session.end_gesture(&terrain, &mut records));
        assert!(!session.is_editing());
        assert_eq!(records.len(), 1);

        // the before image holds the values from before the first stroke
        let record = &records[0];
        assert_eq!(record.before.rect(), IndexRect::new(1, 7, 1, 7));
        assert_eq!(record.before.value(2, 2), 0.5);
        assert_eq!(record.before.value(5, 5), 0.5);
        assert!((record.after.value(2, 2) - 0.7).abs() < 1e-6);

        record.revert(&mut terrain).unwrap();
        assert_eq!(terrain.heights(), original.heights());
    }

    #[test]
    fn test_undo_round_trip_through_history() {
        use crate::undo::UndoHistory;

        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut history = UndoHistory::new(8);
        let mask = BrushMask::radial(16, 0.5).unwrap();
        let tool = EditingTool::SetHeight {
            target: 1.0,
            delta: 0.25,
        };

        for i in 0..4 {
            let x = 0.3 + i as f32 * 0.1;
            session
                .stroke(&mut terrain, &tool, &at(x, 0.5, 0.3), &mask, &mut history)
                .unwrap();
        }
        session.end_gesture(&terrain, &mut history);
        let edited = terrain.heights().clone();

        history.undo(&mut terrain).unwrap();
        assert!(terrain.heights().as_slice().iter().all(|h| *h == 0.5));

        history.redo(&mut terrain).unwrap();
        assert_eq!(terrain.heights(), &edited);
    }

    #[test]
    fn test_undo_after_heightmap_replaced_is_refused() {
        use crate::undo::UndoHistory;

        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut history = UndoHistory::new(8);

        session
            .stroke(&mut terrain, &raise(0.2), &at(0.5, 0.5, 0.2), &BrushMask::solid(), &mut history)
            .unwrap();
        assert!(session.end_gesture(&terrain, &mut history));
        assert_eq!(history.undo_count(), 1);

        // same size, so only the generation tells the grids apart
        terrain.replace_heights(HeightGrid::new(11, 11, 0.9)).unwrap();

        let err = history.undo(&mut terrain).unwrap_err();
        assert!(matches!(err, TerrainEditError::StaleRecord { .. }));
        assert_eq!(terrain.heights().get(5, 5), 0.9);
        assert_eq!(terrain.heights().get(0, 0), 0.9);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_no_op_gesture_emits_nothing() {
        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();

        let change = session
            .stroke(&mut terrain, &raise(0.0), &at(0.5, 0.5, 0.4), &BrushMask::solid(), &mut records)
            .unwrap();
        assert_eq!(change, None);

        assert!(!session.end_gesture(&terrain, &mut records));
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_stroke_is_no_op() {
        let mut terrain = terrain();
        let before = terrain.clone();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let mask = BrushMask::solid();

        let err = session
            .stroke(&mut terrain, &raise(0.1), &at(1.5, 0.5, 0.2), &mask, &mut records)
            .unwrap_err();
        assert!(matches!(err, TerrainEditError::InvalidBrushCenter { .. }));

        let paint = EditingTool::PaintLayer(LayerPaint {
            layer: 3,
            delta: 0.5,
            target: 1.0,
        });
        let err = session
            .stroke(&mut terrain, &paint, &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap_err();
        assert!(err.is_invalid_parameter());

        assert!(!session.is_editing());
        assert_eq!(terrain.heights(), before.heights());
        assert_eq!(terrain.alphamap(), before.alphamap());
    }

    #[test]
    fn test_resize_mid_gesture_discards_snapshot() {
        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let mask = BrushMask::solid();

        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        terrain.replace_heights(HeightGrid::new(21, 21, 0.25)).unwrap();

        assert!(!session.end_gesture(&terrain, &mut records));
        assert!(records.is_empty());

        // a stroke after the resize starts over on the new grid
        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        terrain.replace_heights(HeightGrid::new(11, 11, 0.25)).unwrap();
        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        assert!(session.end_gesture(&terrain, &mut records));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].before.value(5, 5), 0.25);
    }

    #[test]
    fn test_switching_grid_finalizes_gesture() {
        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let mask = BrushMask::solid();

        session
            .stroke(&mut terrain, &raise(0.2), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();

        let paint = EditingTool::PaintLayer(LayerPaint {
            layer: 2,
            delta: 1.0,
            target: 1.0,
        });
        let change = session
            .stroke(&mut terrain, &paint, &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap()
            .unwrap();
        assert_eq!(change.target, GridTarget::Alphamap);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, GridTarget::Heights);
        assert_eq!(session.gesture_target(), Some(GridTarget::Alphamap));

        session.end_gesture(&terrain, &mut records);
        assert_eq!(records.len(), 2);
        assert_eq!(terrain.alphamap().weights(5, 5), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_smooth_stroke_reads_outside_brush() {
        let mut terrain = terrain();
        let mut spike = terrain.get_heights(&IndexRect::new(5, 5, 5, 5));
        spike.set_value(5, 5, 1.0);
        terrain.set_heights(&spike).unwrap();

        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let tool = EditingTool::Smooth(SmoothSettings {
            amount: 1.0,
            neighbor_count: 2,
            direction_degrees: None,
        });

        // brush covers only the spike, its neighbors are read but not written
        session
            .stroke(&mut terrain, &tool, &at(0.5, 0.5, 0.01), &BrushMask::solid(), &mut records)
            .unwrap();

        assert!((terrain.heights().get(5, 5) - (0.5 * 8.0 + 1.0) / 9.0).abs() < 1e-6);
        assert_eq!(terrain.heights().get(4, 5), 0.5);
    }

    #[test]
    fn test_cancel_keeps_edits_without_record() {
        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();

        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &BrushMask::solid(), &mut records)
            .unwrap();
        assert!(session.cancel_gesture());
        assert!(!session.cancel_gesture());

        assert!(!session.end_gesture(&terrain, &mut records));
        assert!(records.is_empty());
        assert!((terrain.heights().get(5, 5) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_listener_lifecycle() {
        let mut terrain = terrain();
        let mut session = EditSession::new();
        let mut records: Vec<TerrainEditRecord> = Vec::new();
        let mask = BrushMask::solid();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = session.subscribe(move |change| sink.lock().unwrap().push(*change));

        let change = session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        // no-op strokes stay silent
        session
            .stroke(&mut terrain, &raise(0.0), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[change.unwrap()]);

        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session
            .stroke(&mut terrain, &raise(0.1), &at(0.5, 0.5, 0.2), &mask, &mut records)
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        session.subscribe(|_| {});
        session.teardown();
        assert!(session.listeners().is_empty());
        assert!(!session.is_editing());
    }

    #[test]
    fn test_eyedrop_reads_nearest_cell() {
        let mut terrain = terrain();
        let mut patch = terrain.get_heights(&IndexRect::new(8, 8, 2, 2));
        patch.set_value(8, 2, 0.9);
        terrain.set_heights(&patch).unwrap();

        let sample = EditSession::eyedrop(&terrain, Vec2::new(0.78, 0.21)).unwrap();
        assert_eq!(sample.height, 0.9);
        assert_eq!(sample.layer_weights, vec![1.0, 0.0, 0.0]);

        assert!(EditSession::eyedrop(&terrain, Vec2::new(-0.1, 0.5)).is_err());
    }
}
