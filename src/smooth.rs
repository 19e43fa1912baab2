/*

Neighbor average smoothing.

The kernel reads from a region grown by (neighbor_count - 1) cells around the
brush rectangle and writes only inside the brush rectangle. Near the grid edges
the kernel shrinks instead of wrapping. Directed smoothing keeps only neighbors
lying along the chosen direction (either way), so a ridge can be smoothed along
its length without being flattened across it.

*/

use crate::affected_area::AffectedArea;
use crate::brush::BrushMask;
use crate::error::{TerrainEditError, TerrainEditResult};
use crate::raster::{GridPatch, IndexRect};

/// Half-width of the cone around the smoothing direction.
pub const DIRECTION_TOLERANCE_DEGREES: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothSettings {
    /// blend factor toward the neighbor average at full brush weight
    pub amount: f32,
    /// kernel reach: neighbors up to `neighbor_count - 1` cells away
    pub neighbor_count: usize,
    /// angle from the grid X axis, in degrees, for directed smoothing
    pub direction_degrees: Option<f32>,
}

impl Default for SmoothSettings {
    fn default() -> Self {
        Self {
            amount: 0.5,
            neighbor_count: 2,
            direction_degrees: None,
        }
    }
}

impl SmoothSettings {
    pub fn validate(&self) -> TerrainEditResult<()> {
        if self.neighbor_count == 0 {
            return Err(TerrainEditError::InvalidParameter(
                "smoothing needs a neighbor count of at least 1".into(),
            ));
        }

        if !self.amount.is_finite() || !(0.0..=1.0).contains(&self.amount) {
            return Err(TerrainEditError::InvalidParameter(format!(
                "smoothing amount {} is outside [0, 1]",
                self.amount
            )));
        }

        if let Some(direction) = self.direction_degrees {
            if !direction.is_finite() {
                return Err(TerrainEditError::InvalidParameter(
                    "smoothing direction must be finite".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn kernel_radius(&self) -> usize {
        self.neighbor_count.saturating_sub(1)
    }

    /// Region the kernel needs to read for a given write rectangle.
    pub fn read_region(&self, write: &IndexRect, bounds: &IndexRect) -> IndexRect {
        write.expanded(self.kernel_radius(), bounds)
    }

    fn accepts_offset(&self, dx: isize, dy: isize) -> bool {
        let Some(direction) = self.direction_degrees else {
            return true;
        };

        // the cell itself always takes part
        if dx == 0 && dy == 0 {
            return true;
        }

        let angle = (dy as f32).atan2(dx as f32).to_degrees();

        angular_distance(angle, direction) <= DIRECTION_TOLERANCE_DEGREES
            || angular_distance(angle, direction + 180.0) <= DIRECTION_TOLERANCE_DEGREES
    }
}

fn angular_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Smooths the cells of `write` under the brush using the pre-pass heights in
/// `read`. `read` must cover `write`. Returns how many cells changed.
pub fn smooth_heights(
    read: &GridPatch,
    write: &mut GridPatch,
    area: &AffectedArea,
    mask: &BrushMask,
    settings: &SmoothSettings,
) -> usize {
    let Some(rect) = area.rect().intersection(&write.rect()) else {
        return 0;
    };

    let bounds = read.rect();
    let radius = settings.kernel_radius();

    let mut changed = 0;
    for (x, y) in rect.cells() {
        let brush_weight = area.brush_weight(mask, x, y);
        let w = (settings.amount * brush_weight).clamp(0.0, 1.0);
        if w <= 0.0 {
            continue;
        }

        let xs = x.saturating_sub(radius).max(bounds.min_x)..=(x + radius).min(bounds.max_x);
        let ys = y.saturating_sub(radius).max(bounds.min_y)..=(y + radius).min(bounds.max_y);

        let mut sum = 0.0;
        let mut count = 0usize;
        for ny in ys {
            for nx in xs.clone() {
                let dx = nx as isize - x as isize;
                let dy = ny as isize - y as isize;
                if !settings.accepts_offset(dx, dy) {
                    continue;
                }
                sum += read.value(nx, ny);
                count += 1;
            }
        }

        debug_assert!(count >= 1, "kernel at ({x}, {y}) read no heights");
        if count == 0 {
            continue;
        }

        let old_height = read.value(x, y);
        let average = sum / count as f32;
        let new_height = old_height + (average - old_height) * w;

        if new_height != write.value(x, y) {
            write.set_value(x, y, new_height);
            changed += 1;
        }
    }

    changed
}
