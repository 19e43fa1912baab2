//! Undo/redo for completed edit gestures.
//!
//! A record holds the before and after image of the rectangle a gesture touched.
//! Undo writes the before image back, redo the after image.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::error::{TerrainEditError, TerrainEditResult};
use crate::raster::GridPatch;
use crate::terrain::{GridTarget, TerrainChange, TerrainData};

/// One undoable gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainEditRecord {
    pub target: GridTarget,
    /// `TerrainData` generation the patches were read from
    pub generation: u64,
    pub before: GridPatch,
    pub after: GridPatch,
}

impl TerrainEditRecord {
    /// Grid index the before/after patches start at.
    pub fn origin(&self) -> (usize, usize) {
        self.before.origin()
    }

    pub fn change(&self) -> TerrainChange {
        TerrainChange {
            target: self.target,
            rect: self.before.rect(),
        }
    }

    pub fn revert(&self, terrain: &mut TerrainData) -> TerrainEditResult<()> {
        self.check_generation(terrain)?;
        terrain.set_window(self.target, &self.before)
    }

    pub fn reapply(&self, terrain: &mut TerrainData) -> TerrainEditResult<()> {
        self.check_generation(terrain)?;
        terrain.set_window(self.target, &self.after)
    }

    // a replaced grid of the same size would still accept the patches
    fn check_generation(&self, terrain: &TerrainData) -> TerrainEditResult<()> {
        if self.generation != terrain.generation() {
            return Err(TerrainEditError::StaleRecord {
                record_generation: self.generation,
                grid_generation: terrain.generation(),
            });
        }
        Ok(())
    }
}

/// Receives one record per completed gesture.
pub trait UndoSink {
    fn submit(&mut self, record: TerrainEditRecord);
}

impl UndoSink for Vec<TerrainEditRecord> {
    fn submit(&mut self, record: TerrainEditRecord) {
        self.push(record);
    }
}

/// Bounded undo/redo stacks of gesture records for one terrain.
#[derive(Component, Debug)]
pub struct UndoHistory {
    past: VecDeque<TerrainEditRecord>,
    future: Vec<TerrainEditRecord>,
    max_entries: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(64)
    }
}

impl UndoSink for UndoHistory {
    fn submit(&mut self, record: TerrainEditRecord) {
        self.push(record);
    }
}

impl UndoHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// A new edit invalidates everything that could be redone.
    pub fn push(&mut self, record: TerrainEditRecord) {
        self.future.clear();
        self.past.push_back(record);
        while self.past.len() > self.max_entries {
            self.past.pop_front();
        }
    }

    /// Restores the before image of the latest record. Returns what changed,
    /// or `None` when there is nothing to undo.
    pub fn undo(&mut self, terrain: &mut TerrainData) -> TerrainEditResult<Option<TerrainChange>> {
        let Some(record) = self.past.pop_back() else {
            return Ok(None);
        };

        if let Err(err) = record.revert(terrain) {
            // the grid was replaced under this record, it can never apply again
            warn!("dropping stale terrain undo record: {err}");
            return Err(err);
        }

        let change = record.change();
        self.future.push(record);
        Ok(Some(change))
    }

    pub fn redo(&mut self, terrain: &mut TerrainData) -> TerrainEditResult<Option<TerrainChange>> {
        let Some(record) = self.future.pop() else {
            return Ok(None);
        };

        if let Err(err) = record.reapply(terrain) {
            warn!("dropping stale terrain redo record: {err}");
            return Err(err);
        }

        let change = record.change();
        self.past.push_back(record);
        Ok(Some(change))
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
