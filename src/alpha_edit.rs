use crate::affected_area::AffectedArea;
use crate::brush::BrushMask;
use crate::error::{TerrainEditError, TerrainEditResult};
use crate::height_edit::{step_toward, TARGET_EPSILON};
use crate::raster::GridPatch;

/// Largest drift of a cell's weight sum tolerated before it is renormalized.
pub const WEIGHT_SUM_EPSILON: f32 = 1e-4;

/// Layer that absorbs the shortfall when no other layer holds weight.
pub const BASE_LAYER: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPaint {
    pub layer: usize,
    /// how far the layer moves per call at full brush weight
    pub delta: f32,
    /// weight the layer converges to
    pub target: f32,
}

impl LayerPaint {
    pub fn validate(&self, layer_count: usize) -> TerrainEditResult<()> {
        if self.layer >= layer_count {
            return Err(TerrainEditError::LayerOutOfRange {
                layer: self.layer,
                layer_count,
            });
        }

        if !self.target.is_finite() || !(0.0..=1.0).contains(&self.target) {
            return Err(TerrainEditError::InvalidParameter(format!(
                "target weight {} is outside [0, 1]",
                self.target
            )));
        }

        if !self.delta.is_finite() {
            return Err(TerrainEditError::InvalidParameter(format!(
                "delta must be finite, got {}",
                self.delta
            )));
        }

        Ok(())
    }
}

/// Pushes one layer of a cell toward `target` and rescales the others so the
/// cell still sums to 1. Returns false when the cell was left untouched.
pub fn paint_layer_weights(
    weights: &mut [f32],
    layer: usize,
    brush_weight: f32,
    delta: f32,
    target: f32,
) -> TerrainEditResult<bool> {
    LayerPaint { layer, delta, target }.validate(weights.len())?;
    Ok(paint_cell(weights, layer, brush_weight * delta, target))
}

fn paint_cell(weights: &mut [f32], layer: usize, step: f32, target: f32) -> bool {
    let current = weights[layer];
    if (current - target).abs() <= TARGET_EPSILON {
        return false;
    }

    let painted = step_toward(current, target, step);
    if painted == current {
        return false;
    }

    weights[layer] = painted;
    renormalize_around(weights, layer);

    // the base layer alone can snap straight back to full coverage
    weights[layer] != current
}

fn renormalize_around(weights: &mut [f32], layer: usize) {
    let painted = weights[layer];
    let others_sum: f32 = weights
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != layer)
        .map(|(_, weight)| *weight)
        .sum();

    if others_sum > 0.0 {
        let scale = (1.0 - painted) / others_sum;
        for (index, weight) in weights.iter_mut().enumerate() {
            if index != layer {
                *weight *= scale;
            }
        }
    } else if painted != 1.0 {
        if layer == BASE_LAYER {
            // nothing else can cover the cell, the base layer keeps full coverage
            weights[BASE_LAYER] = 1.0;
        } else {
            weights[BASE_LAYER] = 1.0 - painted;
        }
    }

    debug_assert!(
        (weights.iter().sum::<f32>() - 1.0).abs() <= WEIGHT_SUM_EPSILON * 10.0,
        "layer weights sum to {} after painting layer {layer}",
        weights.iter().sum::<f32>()
    );
    normalize_sum(weights);
}

/// Divides a weight vector by its sum when the sum has drifted more than
/// `WEIGHT_SUM_EPSILON` from 1. Returns true when the vector was rescaled.
///
/// Rescaling the other layers leaves only float error behind, so this fires
/// for cells that were already off before the paint, such as hand-written
/// patches whose painted layer holds all the weight.
pub fn normalize_sum(weights: &mut [f32]) -> bool {
    let sum: f32 = weights.iter().sum();
    if (sum - 1.0).abs() <= WEIGHT_SUM_EPSILON || sum <= 0.0 {
        return false;
    }

    for weight in weights.iter_mut() {
        *weight /= sum;
    }
    true
}

/// Paints a layer on every cell of `patch` under the brush. Returns how many
/// cells changed.
///
/// The layer and target are checked against the patch before any cell is
/// touched.
pub fn paint_layer(
    patch: &mut GridPatch,
    area: &AffectedArea,
    mask: &BrushMask,
    paint: &LayerPaint,
) -> TerrainEditResult<usize> {
    paint.validate(patch.channels())?;

    let Some(rect) = area.rect().intersection(&patch.rect()) else {
        return Ok(0);
    };

    let mut changed = 0;
    for (x, y) in rect.cells() {
        let brush_weight = area.brush_weight(mask, x, y);
        if brush_weight <= 0.0 {
            continue;
        }

        if paint_cell(patch.cell_mut(x, y), paint.layer, paint.delta * brush_weight, paint.target) {
            changed += 1;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphamap::AlphaGrid;
    use crate::brush::BrushPlacement;
    use bevy::math::Vec2;

    fn sum(weights: &[f32]) -> f32 {
        weights.iter().sum()
    }

    #[test]
    fn test_full_strength_displaces_base_layer() {
        let mut weights = [1.0, 0.0, 0.0];
        assert!(paint_layer_weights(&mut weights, 1, 1.0, 1.0, 1.0).unwrap());

        assert_eq!(weights, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_other_layers_keep_their_ratio() {
        let mut weights = [0.5, 0.25, 0.25, 0.0];
        paint_layer_weights(&mut weights, 3, 1.0, 0.2, 1.0).unwrap();

        assert!((weights[3] - 0.2).abs() < 1e-6);
        assert!((weights[0] - 0.4).abs() < 1e-6);
        assert!((weights[1] - 0.2).abs() < 1e-6);
        assert!((weights[1] - weights[2]).abs() < 1e-6);
        assert!((sum(&weights) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_shortfall_goes_to_base_layer() {
        let mut weights = [0.0, 1.0, 0.0];
        paint_layer_weights(&mut weights, 1, 1.0, 0.3, 0.0).unwrap();

        assert!((weights[1] - 0.7).abs() < 1e-6);
        assert!((weights[0] - 0.3).abs() < 1e-6);
        assert_eq!(weights[2], 0.0);
    }

    #[test]
    fn test_base_layer_cannot_be_emptied_alone() {
        let mut weights = [1.0, 0.0, 0.0];
        assert!(!paint_layer_weights(&mut weights, 0, 1.0, 0.5, 0.0).unwrap());

        assert_eq!(weights, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_converges_and_stays() {
        let mut weights = [0.6, 0.3, 0.1];
        let mut previous = weights[2];
        for _ in 0..20 {
            paint_layer_weights(&mut weights, 2, 0.8, 0.15, 0.9).unwrap();
            assert!(weights[2] >= previous);
            assert!(weights[2] <= 0.9);
            assert!((sum(&weights) - 1.0).abs() < 1e-4);
            previous = weights[2];
        }
        assert_eq!(weights[2], 0.9);

        let converged = weights;
        assert!(!paint_layer_weights(&mut weights, 2, 1.0, 0.15, 0.9).unwrap());
        assert_eq!(weights, converged);
    }

    #[test]
    fn test_zero_strength_is_bit_identical() {
        let mut weights = [0.3, 0.3, 0.4];
        let before = weights;

        assert!(!paint_layer_weights(&mut weights, 1, 0.0, 0.5, 1.0).unwrap());
        assert!(!paint_layer_weights(&mut weights, 1, 1.0, 0.0, 1.0).unwrap());
        assert_eq!(weights, before);
    }

    #[test]
    fn test_sum_invariant_over_patch() {
        let mut grid = AlphaGrid::new(9, 9, 4);
        let mask = BrushMask::radial(16, 0.3).unwrap();

        let strokes = [
            (Vec2::new(0.5, 0.5), 0.6, 1, 1.0),
            (Vec2::new(0.2, 0.7), 0.5, 2, 0.8),
            (Vec2::new(0.6, 0.4), 0.9, 3, 0.5),
            (Vec2::new(0.5, 0.5), 1.0, 0, 1.0),
            (Vec2::new(0.0, 0.0), 0.7, 2, 0.0),
        ];

        for _ in 0..4 {
            for (center, size, layer, target) in strokes {
                let area = AffectedArea::resolve(&BrushPlacement::new(center, size), grid.max_index()).unwrap();
                let mut patch = grid.get_window(&area.rect());
                paint_layer(
                    &mut patch,
                    &area,
                    &mask,
                    &LayerPaint {
                        layer,
                        delta: 0.35,
                        target,
                    },
                )
                .unwrap();
                grid.set_window(&patch).unwrap();

                assert!(grid.max_sum_error() < 1e-4);
            }
        }
    }

    #[test]
    fn test_layer_out_of_range_is_rejected() {
        let mut weights = [1.0, 0.0];

        let err = paint_layer_weights(&mut weights, 2, 1.0, 0.5, 1.0).unwrap_err();
        assert!(matches!(
            err,
            TerrainEditError::LayerOutOfRange {
                layer: 2,
                layer_count: 2
            }
        ));
        assert!(paint_layer_weights(&mut weights, 1, 1.0, 0.5, 1.5).is_err());
        assert_eq!(weights, [1.0, 0.0]);
    }

    #[test]
    fn test_paint_layer_checks_patch_channels() {
        let grid = AlphaGrid::new(5, 5, 2);
        let area = AffectedArea::resolve(&BrushPlacement::new(Vec2::splat(0.5), 1.0), grid.max_index()).unwrap();
        let mut patch = grid.get_window(&area.rect());
        let before = patch.clone();

        let paint = LayerPaint {
            layer: 3,
            delta: 1.0,
            target: 1.0,
        };
        let err = paint_layer(&mut patch, &area, &BrushMask::solid(), &paint).unwrap_err();

        assert!(err.is_invalid_parameter());
        assert_eq!(patch, before);
    }

    #[test]
    fn test_drifted_cell_is_renormalized() {
        // sums to 1.2, well past the tolerance
        let mut weights = [0.7, 0.2, 0.3];
        assert!(normalize_sum(&mut weights));
        assert!((sum(&weights) - 1.0).abs() < 1e-6);
        assert!((weights[0] - 0.7 / 1.2).abs() < 1e-6);

        let mut settled = [0.5, 0.25, 0.25 + WEIGHT_SUM_EPSILON / 2.0];
        let before = settled;
        assert!(!normalize_sum(&mut settled));
        assert_eq!(settled, before);

        let mut empty = [0.0, 0.0];
        assert!(!normalize_sum(&mut empty));
    }

    #[test]
    fn test_paint_repairs_drifted_input() {
        // a cell that sums to 1.2 before painting still ends at 1
        let mut weights = [0.6, 0.4, 0.2];
        assert!(paint_layer_weights(&mut weights, 2, 1.0, 0.1, 1.0).unwrap());

        assert!((sum(&weights) - 1.0).abs() < 1e-5);
        assert!((weights[2] - 0.3).abs() < 1e-6);
    }
}
