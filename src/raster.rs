/*

Rectangular windows over the terrain grids.

Both the heightmap and the alphamap are edited through copies of a sub-rectangle
(a GridPatch) that are written back in one call. Coordinates on a patch are always
absolute grid indices, never patch-local ones.

*/

use std::ops::RangeInclusive;

/// Inclusive integer rectangle of grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRect {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
}

impl IndexRect {
    pub fn new(min_x: usize, max_x: usize, min_y: usize, max_y: usize) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Rectangle covering a whole grid of the given dimensions.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, width.saturating_sub(1), 0, height.saturating_sub(1))
    }

    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    pub fn xs(&self) -> RangeInclusive<usize> {
        self.min_x..=self.max_x
    }

    pub fn ys(&self) -> RangeInclusive<usize> {
        self.min_y..=self.max_y
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains_rect(&self, other: &IndexRect) -> bool {
        self.contains(other.min_x, other.min_y) && self.contains(other.max_x, other.max_y)
    }

    pub fn union(&self, other: &IndexRect) -> IndexRect {
        IndexRect::new(
            self.min_x.min(other.min_x),
            self.max_x.max(other.max_x),
            self.min_y.min(other.min_y),
            self.max_y.max(other.max_y),
        )
    }

    pub fn intersection(&self, other: &IndexRect) -> Option<IndexRect> {
        let min_x = self.min_x.max(other.min_x);
        let max_x = self.max_x.min(other.max_x);
        let min_y = self.min_y.max(other.min_y);
        let max_y = self.max_y.min(other.max_y);

        if min_x > max_x || min_y > max_y {
            return None;
        }

        Some(IndexRect::new(min_x, max_x, min_y, max_y))
    }

    /// Grows the rectangle by `margin` cells on every side, clamped to `bounds`.
    pub fn expanded(&self, margin: usize, bounds: &IndexRect) -> IndexRect {
        IndexRect::new(
            self.min_x.saturating_sub(margin).max(bounds.min_x),
            (self.max_x + margin).min(bounds.max_x),
            self.min_y.saturating_sub(margin).max(bounds.min_y),
            (self.max_y + margin).min(bounds.max_y),
        )
    }

    /// Row-major iteration over every (x, y) in the rectangle.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let xs = self.xs();
        self.ys()
            .flat_map(move |y| xs.clone().map(move |x| (x, y)))
    }
}

/// A copied window of a grid: `channels` floats per cell, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPatch {
    rect: IndexRect,
    channels: usize,
    data: Vec<f32>,
}

impl GridPatch {
    pub fn new(rect: IndexRect, channels: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            rect.cell_count() * channels,
            "patch data does not match its rectangle"
        );
        Self {
            rect,
            channels,
            data,
        }
    }

    pub fn filled(rect: IndexRect, channels: usize, value: f32) -> Self {
        Self::new(rect, channels, vec![value; rect.cell_count() * channels])
    }

    pub fn rect(&self) -> IndexRect {
        self.rect
    }

    /// Grid index of the patch's first cell, the undo record origin.
    pub fn origin(&self) -> (usize, usize) {
        (self.rect.min_x, self.rect.min_y)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.rect.contains(x, y), "({x}, {y}) outside patch {:?}", self.rect);
        ((y - self.rect.min_y) * self.rect.width() + (x - self.rect.min_x)) * self.channels
    }

    /// All channels of one cell.
    pub fn cell(&self, x: usize, y: usize) -> &[f32] {
        let start = self.offset(x, y);
        &self.data[start..start + self.channels]
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let start = self.offset(x, y);
        let channels = self.channels;
        &mut self.data[start..start + channels]
    }

    /// First channel of a cell, the height on single channel patches.
    pub fn value(&self, x: usize, y: usize) -> f32 {
        self.data[self.offset(x, y)]
    }

    pub fn set_value(&mut self, x: usize, y: usize, value: f32) {
        let index = self.offset(x, y);
        self.data[index] = value;
    }

    /// Copies every overlapping cell of `other` into this patch.
    pub fn overlay(&mut self, other: &GridPatch) {
        debug_assert_eq!(self.channels, other.channels);

        let Some(shared) = self.rect.intersection(&other.rect) else {
            return;
        };

        for (x, y) in shared.cells() {
            let src = other.offset(x, y);
            let dst = self.offset(x, y);
            self.data[dst..dst + self.channels]
                .copy_from_slice(&other.data[src..src + other.channels]);
        }
    }
}
