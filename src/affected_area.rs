use bevy::math::Vec2;

use crate::brush::{BrushMask, BrushPlacement};
use crate::error::{TerrainEditError, TerrainEditResult};
use crate::raster::IndexRect;

/// Grid index rectangle a brush placement can influence, plus what is needed
/// to map a cell back into the brush's own [0, 1] square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffectedArea {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,

    /// normalized grid position of the brush square's min corner (may be negative)
    pub rel_brush_min: Vec2,
    pub brush_size: f32,
    pub grid_max: (usize, usize),
}

impl AffectedArea {
    /// Resolves a placement against a grid whose largest index is `grid_max`.
    ///
    /// The rectangle is floor/ceil expanded so it contains every cell under the
    /// footprint, then clamped (not wrapped) to the grid.
    pub fn resolve(placement: &BrushPlacement, grid_max: (usize, usize)) -> TerrainEditResult<Self> {
        placement.validate()?;

        if grid_max.0 == 0 || grid_max.1 == 0 {
            return Err(TerrainEditError::InvalidParameter(format!(
                "grid must have at least two samples per axis, max index is {grid_max:?}"
            )));
        }

        let half = placement.size / 2.0;
        let rel_min = placement.center - Vec2::splat(half);
        let rel_max = placement.center + Vec2::splat(half);

        let (min_x, max_x) = resolve_axis(rel_min.x, rel_max.x, grid_max.0);
        let (min_y, max_y) = resolve_axis(rel_min.y, rel_max.y, grid_max.1);

        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
            rel_brush_min: rel_min,
            brush_size: placement.size,
            grid_max,
        })
    }

    pub fn rect(&self) -> IndexRect {
        IndexRect::new(self.min_x, self.max_x, self.min_y, self.max_y)
    }

    /// Normalized grid position of a cell.
    pub fn normalized_position(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new(
            x as f32 / self.grid_max.0 as f32,
            y as f32 / self.grid_max.1 as f32,
        )
    }

    /// Where a grid cell falls inside the brush square, `None` when it is outside.
    pub fn brush_uv(&self, x: usize, y: usize) -> Option<Vec2> {
        if self.brush_size <= 0.0 {
            return None;
        }

        let uv = (self.normalized_position(x, y) - self.rel_brush_min) / self.brush_size;

        if (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y) {
            Some(uv)
        } else {
            None
        }
    }

    /// Brush falloff weight of a grid cell.
    pub fn brush_weight(&self, mask: &BrushMask, x: usize, y: usize) -> f32 {
        match self.brush_uv(x, y) {
            Some(uv) => mask.sample(uv.x, uv.y),
            None => 0.0,
        }
    }
}

fn resolve_axis(rel_min: f32, rel_max: f32, grid_max: usize) -> (usize, usize) {
    let max = grid_max as f32;
    let min_index = (max * rel_min).floor().clamp(0.0, max) as usize;
    let max_index = (max * rel_max).ceil().clamp(0.0, max) as usize;

    (min_index, max_index)
}
