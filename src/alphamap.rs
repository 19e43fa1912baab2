use crate::error::{TerrainEditError, TerrainEditResult};
use crate::raster::{GridPatch, IndexRect};

/// Per cell texture layer weights, `layer_count` floats per cell.
///
/// Every cell's weights sum to 1. A fresh alphamap is fully covered by
/// layer 0, the base layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaGrid {
    width: usize,
    height: usize,
    layer_count: usize,
    weights: Vec<f32>,
}

impl AlphaGrid {
    pub fn new(width: usize, height: usize, layer_count: usize) -> Self {
        let mut weights = vec![0.0; width * height * layer_count];
        if layer_count > 0 {
            for cell in weights.chunks_exact_mut(layer_count) {
                cell[0] = 1.0;
            }
        }

        Self {
            width,
            height,
            layer_count,
            weights,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn max_index(&self) -> (usize, usize) {
        (self.width.saturating_sub(1), self.height.saturating_sub(1))
    }

    pub fn bounds(&self) -> IndexRect {
        IndexRect::full(self.width, self.height)
    }

    pub fn weights(&self, x: usize, y: usize) -> &[f32] {
        let start = (y * self.width + x) * self.layer_count;
        &self.weights[start..start + self.layer_count]
    }

    pub fn set_weights(&mut self, x: usize, y: usize, weights: &[f32]) {
        let start = (y * self.width + x) * self.layer_count;
        self.weights[start..start + self.layer_count].copy_from_slice(weights);
    }

    pub fn get_window(&self, rect: &IndexRect) -> GridPatch {
        let rect = rect
            .intersection(&self.bounds())
            .unwrap_or_else(|| IndexRect::new(0, 0, 0, 0));

        let mut data = Vec::with_capacity(rect.cell_count() * self.layer_count);
        for y in rect.ys() {
            let start = (y * self.width + rect.min_x) * self.layer_count;
            let end = (y * self.width + rect.max_x + 1) * self.layer_count;
            data.extend_from_slice(&self.weights[start..end]);
        }

        GridPatch::new(rect, self.layer_count, data)
    }

    pub fn set_window(&mut self, patch: &GridPatch) -> TerrainEditResult<()> {
        let rect = patch.rect();
        if patch.channels() != self.layer_count || !self.bounds().contains_rect(&rect) {
            return Err(TerrainEditError::PatchMismatch {
                x: rect.min_x,
                y: rect.min_y,
                patch_width: rect.width(),
                patch_height: rect.height(),
                patch_channels: patch.channels(),
            });
        }

        let row_len = rect.width() * self.layer_count;
        for (row_index, y) in rect.ys().enumerate() {
            let src = row_index * row_len;
            let dst = (y * self.width + rect.min_x) * self.layer_count;
            self.weights[dst..dst + row_len].copy_from_slice(&patch.data()[src..src + row_len]);
        }

        Ok(())
    }

    /// Largest deviation of any cell's weight sum from 1.
    pub fn max_sum_error(&self) -> f32 {
        if self.layer_count == 0 {
            return 0.0;
        }

        self.weights
            .chunks_exact(self.layer_count)
            .map(|cell| (cell.iter().sum::<f32>() - 1.0).abs())
            .fold(0.0, f32::max)
    }
}
