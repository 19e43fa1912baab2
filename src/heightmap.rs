/*
https://github.com/norman784/gaiku/blob/master/crates/gaiku_baker_heightmap/src/lib.rs
*/

use image::DynamicImage;

use crate::error::{TerrainEditError, TerrainEditResult};
use crate::raster::{GridPatch, IndexRect};

/// Normalized terrain elevation samples, row-major.
///
/// Values are nominally in [0, 1] and scaled to world units by the terrain size.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

impl HeightGrid {
    pub fn new(width: usize, height: usize, initial_height: f32) -> Self {
        Self {
            width,
            height,
            heights: vec![initial_height; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut heights = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                heights.push(f(x, y));
            }
        }

        Self {
            width,
            height,
            heights,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Largest valid index per axis, the `gridMax` used to normalize positions.
    pub fn max_index(&self) -> (usize, usize) {
        (self.width.saturating_sub(1), self.height.saturating_sub(1))
    }

    pub fn bounds(&self) -> IndexRect {
        IndexRect::full(self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.heights[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.heights[y * self.width + x] = value;
    }

    /// Copies out a window, clamped to the grid. Near the edges the returned
    /// patch can be smaller than the requested rectangle.
    pub fn get_window(&self, rect: &IndexRect) -> GridPatch {
        let rect = rect
            .intersection(&self.bounds())
            .unwrap_or_else(|| IndexRect::new(0, 0, 0, 0));

        let mut data = Vec::with_capacity(rect.cell_count());
        for y in rect.ys() {
            let row = y * self.width;
            data.extend_from_slice(&self.heights[row + rect.min_x..=row + rect.max_x]);
        }

        GridPatch::new(rect, 1, data)
    }

    pub fn set_window(&mut self, patch: &GridPatch) -> TerrainEditResult<()> {
        let rect = patch.rect();
        if patch.channels() != 1 || !self.bounds().contains_rect(&rect) {
            return Err(TerrainEditError::PatchMismatch {
                x: rect.min_x,
                y: rect.min_y,
                patch_width: rect.width(),
                patch_height: rect.height(),
                patch_channels: patch.channels(),
            });
        }

        for (row_index, y) in rect.ys().enumerate() {
            let src = row_index * rect.width();
            let dst = y * self.width + rect.min_x;
            self.heights[dst..dst + rect.width()]
                .copy_from_slice(&patch.data()[src..src + rect.width()]);
        }

        Ok(())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.heights
    }
}

pub trait HeightMap {
    fn load_from_image(image: &DynamicImage) -> TerrainEditResult<Self>
    where
        Self: Sized;
}

impl HeightMap for HeightGrid {
    fn load_from_image(image: &DynamicImage) -> TerrainEditResult<Self> {
        // 16 bit luminance keeps the precision of 16 bit heightmap pngs
        let luma = image.to_luma16();

        let width = luma.width() as usize;
        let height = luma.height() as usize;

        if width < 2 || height < 2 {
            return Err(TerrainEditError::InvalidParameter(format!(
                "heightmap image must be at least 2x2, got {width}x{height}"
            )));
        }

        let heights = luma
            .pixels()
            .map(|pixel| pixel.0[0] as f32 / u16::MAX as f32)
            .collect();

        Ok(Self {
            width,
            height,
            heights,
        })
    }
}
