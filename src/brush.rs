use std::path::Path;

use bevy::prelude::*;
use bevy::utils::HashMap;
use image::{DynamicImage, GenericImageView};

use crate::error::{TerrainEditError, TerrainEditResult};

/// Where a brush sits on a grid, in normalized terrain coordinates.
///
/// The footprint is a square with edge `size` (a fraction of the grid extent)
/// centered on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushPlacement {
    pub center: Vec2,
    pub size: f32,
}

impl BrushPlacement {
    pub fn new(center: Vec2, size: f32) -> Self {
        Self { center, size }
    }

    /// Rejects placements outside the unit square instead of clamping them.
    pub fn validate(&self) -> TerrainEditResult<()> {
        if !self.size.is_finite() || !(0.0..=1.0).contains(&self.size) {
            return Err(TerrainEditError::InvalidBrushSize(self.size));
        }

        let in_unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.center.x) || !in_unit(self.center.y) {
            return Err(TerrainEditError::InvalidBrushCenter {
                x: self.center.x,
                y: self.center.y,
            });
        }

        Ok(())
    }
}

/// Spatial falloff of a brush, sampled with bilinear filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushMask {
    width: usize,
    height: usize,
    texels: Vec<f32>,
}

impl BrushMask {
    pub fn from_fn(
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> f32,
    ) -> TerrainEditResult<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainEditError::EmptyBrushMask);
        }

        let mut texels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y).clamp(0.0, 1.0));
            }
        }

        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// A mask that is 1 everywhere, a hard square brush.
    pub fn solid() -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![1.0],
        }
    }

    /// Round brush: 1 in the center fading to 0 at the rim. Higher hardness
    /// keeps the plateau wider and the edge sharper.
    pub fn radial(resolution: usize, hardness: f32) -> TerrainEditResult<Self> {
        let resolution = resolution.max(1);
        let hardness = hardness.max(0.0);

        Self::from_fn(resolution, resolution, |x, y| {
            let uv = Vec2::new(
                (x as f32 + 0.5) / resolution as f32,
                (y as f32 + 0.5) / resolution as f32,
            );
            let distance = uv.distance(Vec2::splat(0.5)) * 2.0;

            get_hardness_multiplier(distance, 1.0, hardness)
        })
    }

    /// Uses the alpha channel when the image has one, luminance otherwise.
    pub fn from_image(image: &DynamicImage) -> TerrainEditResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TerrainEditError::EmptyBrushMask);
        }

        let use_alpha = image.color().has_alpha();
        let texels = image
            .to_luma_alpha8()
            .pixels()
            .map(|pixel| {
                let [luma, alpha] = pixel.0;
                let value = if use_alpha { alpha } else { luma };
                value as f32 / 255.0
            })
            .collect();

        Ok(Self {
            width: width as usize,
            height: height as usize,
            texels,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> TerrainEditResult<Self> {
        let image = image::open(path.as_ref())?;
        debug!("loaded brush mask {}", path.as_ref().display());
        Self::from_image(&image)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn texel(&self, x: usize, y: usize) -> f32 {
        self.texels[y * self.width + x]
    }

    /// Bilinear sample over the four nearest texel centers, clamped at the border.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = self.texel(x0, y0) * (1.0 - tx) + self.texel(x1, y0) * tx;
        let bottom = self.texel(x0, y1) * (1.0 - tx) + self.texel(x1, y1) * tx;

        top * (1.0 - ty) + bottom * ty
    }
}

/// Named brush masks available to the edit systems.
#[derive(Resource, Default, Debug)]
pub struct BrushLibrary {
    masks: HashMap<String, BrushMask>,
}

impl BrushLibrary {
    pub fn insert(&mut self, name: impl Into<String>, mask: BrushMask) {
        self.masks.insert(name.into(), mask);
    }

    pub fn load<P: AsRef<Path>>(&mut self, name: impl Into<String>, path: P) -> TerrainEditResult<()> {
        let mask = BrushMask::open(path)?;
        self.insert(name, mask);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<BrushMask> {
        self.masks.remove(name)
    }

    pub fn get(&self, name: &str) -> TerrainEditResult<&BrushMask> {
        self.masks
            .get(name)
            .ok_or_else(|| TerrainEditError::MissingBrushMask(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

pub(crate) fn get_hardness_multiplier(pixel_distance: f32, brush_radius: f32, brush_hardness: f32) -> f32 {
    // distance as a fraction of the radius, capped at the rim
    let distance_percent = pixel_distance / brush_radius;
    let adjusted_distance_percent = f32::min(1.0, distance_percent);

    // hardness 0 is a linear fade from 1 at the center to 0 at the edge
    let fade_effect = 1.0 - adjusted_distance_percent;

    (fade_effect * (1.0 + brush_hardness) - (adjusted_distance_percent * brush_hardness))
        .clamp(0.0, 1.0)
}
