use crate::affected_area::AffectedArea;
use crate::brush::BrushMask;
use crate::raster::GridPatch;

/// Values this close to their target count as converged and are left alone.
pub const TARGET_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightBrushOp {
    /// raise (positive) or lower (negative) without any bound
    Delta(f32),
    /// move toward `target` by at most `delta` per call, never past it
    TowardTarget { delta: f32, target: f32 },
}

pub fn apply_delta(height: f32, brush_weight: f32, delta: f32) -> f32 {
    height + delta * brush_weight
}

pub fn apply_toward_target(height: f32, brush_weight: f32, delta: f32, target: f32) -> f32 {
    step_toward(height, target, delta * brush_weight)
}

/// Moves `value` toward `target` by `|step|`, snapping onto the target
/// instead of stepping past it.
pub fn step_toward(value: f32, target: f32, step: f32) -> f32 {
    let remaining = target - value;
    if remaining.abs() <= TARGET_EPSILON || step == 0.0 {
        return value;
    }

    let direction = remaining.signum();
    let next = value + direction * step.abs();

    // crossing (or landing on) the target flips the sign of what is left
    if (target - next).signum() != direction || next == target {
        target
    } else {
        next
    }
}

/// Applies a height brush to every cell of `patch` under the brush.
/// Returns how many cells changed.
pub fn paint_heights(
    patch: &mut GridPatch,
    area: &AffectedArea,
    mask: &BrushMask,
    op: HeightBrushOp,
) -> usize {
    let Some(rect) = area.rect().intersection(&patch.rect()) else {
        return 0;
    };

    let mut changed = 0;
    for (x, y) in rect.cells() {
        let brush_weight = area.brush_weight(mask, x, y);
        if brush_weight <= 0.0 {
            continue;
        }

        let height = patch.value(x, y);
        let new_height = match op {
            HeightBrushOp::Delta(delta) => apply_delta(height, brush_weight, delta),
            HeightBrushOp::TowardTarget { delta, target } => {
                apply_toward_target(height, brush_weight, delta, target)
            }
        };

        if new_height != height {
            patch.set_value(x, y, new_height);
            changed += 1;
        }
    }

    changed
}
