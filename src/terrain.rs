use bevy::prelude::*;
use image::DynamicImage;

use crate::alphamap::AlphaGrid;
use crate::brush::BrushPlacement;
use crate::error::{TerrainEditError, TerrainEditResult};
use crate::heightmap::{HeightGrid, HeightMap};
use crate::raster::{GridPatch, IndexRect};
use crate::session::EditSession;
use crate::terrain_config::TerrainConfig;
use crate::undo::UndoHistory;

/// Which grid of the terrain an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridTarget {
    Heights,
    Alphamap,
}

/// "heights changed" / "alphamaps changed", with the rectangle that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainChange {
    pub target: GridTarget,
    pub rect: IndexRect,
}

impl TerrainChange {
    pub fn heights(rect: IndexRect) -> Self {
        Self {
            target: GridTarget::Heights,
            rect,
        }
    }

    pub fn alphamap(rect: IndexRect) -> Self {
        Self {
            target: GridTarget::Alphamap,
            rect,
        }
    }
}

/// The sculptable grids of one terrain entity.
///
/// All edits go through the windowed get/set calls. Replacing a grid or changing
/// the layer count bumps the generation, which aborts any gesture in flight.
#[derive(Component, Debug, Clone)]
pub struct TerrainData {
    heights: HeightGrid,
    alphamap: AlphaGrid,
    size: Vec3,
    generation: u64,
}

impl TerrainData {
    pub fn new(config: &TerrainConfig) -> TerrainEditResult<Self> {
        config.validate()?;

        let [hw, hh] = config.heightmap_resolution;
        let [aw, ah] = config.alphamap_resolution;

        Self::from_grids(
            HeightGrid::new(hw as usize, hh as usize, config.initial_height),
            AlphaGrid::new(aw as usize, ah as usize, config.alphamap_layers as usize),
            config.get_terrain_size(),
        )
    }

    pub fn from_grids(heights: HeightGrid, alphamap: AlphaGrid, size: Vec3) -> TerrainEditResult<Self> {
        check_heights(&heights)?;
        check_alphamap(&alphamap)?;

        Ok(Self {
            heights,
            alphamap,
            size,
            generation: 0,
        })
    }

    pub fn heights(&self) -> &HeightGrid {
        &self.heights
    }

    pub fn alphamap(&self) -> &AlphaGrid {
        &self.alphamap
    }

    /// World size of the terrain, y being the height of a cell at 1.0.
    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn heightmap_size(&self) -> (usize, usize) {
        (self.heights.width(), self.heights.height())
    }

    pub fn alphamap_size(&self) -> (usize, usize) {
        (self.alphamap.width(), self.alphamap.height())
    }

    pub fn layer_count(&self) -> usize {
        self.alphamap.layer_count()
    }

    pub fn get_heights(&self, rect: &IndexRect) -> GridPatch {
        self.heights.get_window(rect)
    }

    pub fn set_heights(&mut self, patch: &GridPatch) -> TerrainEditResult<()> {
        self.heights.set_window(patch)
    }

    pub fn get_alpha_layers(&self, rect: &IndexRect) -> GridPatch {
        self.alphamap.get_window(rect)
    }

    pub fn set_alpha_layers(&mut self, patch: &GridPatch) -> TerrainEditResult<()> {
        self.alphamap.set_window(patch)
    }

    /// Copies a window out of the grid `target` names.
    pub fn get_window(&self, target: GridTarget, rect: &IndexRect) -> GridPatch {
        match target {
            GridTarget::Heights => self.get_heights(rect),
            GridTarget::Alphamap => self.get_alpha_layers(rect),
        }
    }

    pub fn set_window(&mut self, target: GridTarget, patch: &GridPatch) -> TerrainEditResult<()> {
        match target {
            GridTarget::Heights => self.set_heights(patch),
            GridTarget::Alphamap => self.set_alpha_layers(patch),
        }
    }

    /// Largest index per axis of the grid `target` names.
    pub fn max_index(&self, target: GridTarget) -> (usize, usize) {
        match target {
            GridTarget::Heights => self.heights.max_index(),
            GridTarget::Alphamap => self.alphamap.max_index(),
        }
    }

    pub fn bounds(&self, target: GridTarget) -> IndexRect {
        match target {
            GridTarget::Heights => self.heights.bounds(),
            GridTarget::Alphamap => self.alphamap.bounds(),
        }
    }

    /// Width, height and channels per cell of the grid `target` names.
    pub fn grid_shape(&self, target: GridTarget) -> (usize, usize, usize) {
        match target {
            GridTarget::Heights => (self.heights.width(), self.heights.height(), 1),
            GridTarget::Alphamap => (
                self.alphamap.width(),
                self.alphamap.height(),
                self.alphamap.layer_count(),
            ),
        }
    }

    pub fn replace_heights(&mut self, heights: HeightGrid) -> TerrainEditResult<()> {
        check_heights(&heights)?;
        self.heights = heights;
        self.generation += 1;
        Ok(())
    }

    pub fn replace_alphamap(&mut self, alphamap: AlphaGrid) -> TerrainEditResult<()> {
        check_alphamap(&alphamap)?;
        self.alphamap = alphamap;
        self.generation += 1;
        Ok(())
    }

    /// Replaces the heightmap with a grayscale image, keeping its resolution.
    pub fn import_heightmap(&mut self, image: &DynamicImage) -> TerrainEditResult<()> {
        let heights = HeightGrid::load_from_image(image)?;
        info!("imported {}x{} heightmap", heights.width(), heights.height());
        self.replace_heights(heights)
    }

    /// Adds empty layers or drops trailing ones, renormalizing what is left.
    pub fn set_layer_count(&mut self, layer_count: usize) -> TerrainEditResult<()> {
        if layer_count == 0 {
            return Err(TerrainEditError::InvalidParameter(
                "terrain needs at least one alphamap layer".into(),
            ));
        }

        let (width, height) = self.alphamap_size();
        let mut resized = AlphaGrid::new(width, height, layer_count);
        let kept = layer_count.min(self.layer_count());

        let mut weights = vec![0.0; layer_count];
        for (x, y) in self.alphamap.bounds().cells() {
            weights.fill(0.0);
            weights[..kept].copy_from_slice(&self.alphamap.weights(x, y)[..kept]);

            let sum: f32 = weights.iter().sum();
            if sum > 0.0 {
                weights.iter_mut().for_each(|w| *w /= sum);
            } else {
                weights[0] = 1.0;
            }
            resized.set_weights(x, y, &weights);
        }

        debug!("alphamap layer count {} -> {}", self.layer_count(), layer_count);
        self.replace_alphamap(resized)
    }

    /// Placement for a brush of world `radius` centered on world XZ `point`,
    /// relative to the terrain origin.
    pub fn placement_from_world(&self, point: Vec2, radius: f32) -> BrushPlacement {
        let extent = Vec2::new(self.size.x, self.size.z);
        BrushPlacement::new(point / extent, 2.0 * radius / extent.max_element())
    }

    /// World space height of a heightmap sample.
    pub fn world_height(&self, x: usize, y: usize) -> f32 {
        self.heights.get(x, y) * self.size.y
    }
}

/// Everything a terrain entity needs to be sculpted.
#[derive(Bundle)]
pub struct SculptableTerrainBundle {
    pub terrain_data: TerrainData,
    pub edit_session: EditSession,
    pub undo_history: UndoHistory,
}

impl SculptableTerrainBundle {
    pub fn new(config: &TerrainConfig) -> TerrainEditResult<Self> {
        Ok(Self {
            terrain_data: TerrainData::new(config)?,
            edit_session: EditSession::new(),
            undo_history: UndoHistory::new(config.undo_history_depth),
        })
    }
}

/// Builds the editable grids for terrain entities spawned with only a config.
pub fn initialize_terrain_data(
    mut commands: Commands,
    terrain_query: Query<(Entity, &TerrainConfig), Without<TerrainData>>,
) {
    for (terrain_entity, terrain_config) in terrain_query.iter() {
        match SculptableTerrainBundle::new(terrain_config) {
            Ok(bundle) => {
                info!(
                    "initialized terrain data {:?} for {:?}",
                    terrain_config.heightmap_resolution, terrain_entity
                );
                commands.entity(terrain_entity).insert(bundle);
            }
            Err(err) => {
                // keep it from being retried every frame
                warn!("terrain config on {:?} rejected: {}", terrain_entity, err);
                commands.entity(terrain_entity).remove::<TerrainConfig>();
            }
        }
    }
}

fn check_heights(heights: &HeightGrid) -> TerrainEditResult<()> {
    if heights.width() < 2 || heights.height() < 2 {
        return Err(TerrainEditError::InvalidParameter(format!(
            "heightmap must be at least 2x2, got {}x{}",
            heights.width(),
            heights.height()
        )));
    }
    Ok(())
}

fn check_alphamap(alphamap: &AlphaGrid) -> TerrainEditResult<()> {
    if alphamap.width() < 2 || alphamap.height() < 2 || alphamap.layer_count() == 0 {
        return Err(TerrainEditError::InvalidParameter(format!(
            "alphamap must be at least 2x2 with one layer, got {}x{}x{}",
            alphamap.width(),
            alphamap.height(),
            alphamap.layer_count()
        )));
    }
    Ok(())
}
