/*

this is loaded from a RON file

describes the grids a sculptable terrain starts with and how much edit history it keeps

*/
use std::fs;
use std::path::Path;

use anyhow::Context;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainEditError, TerrainEditResult};

#[derive(Component, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TerrainConfig {
    /// world size: x is the width, y the height of a fully raised cell, z the length
    pub terrain_dimensions: [f32; 3],

    /// heightmap samples per axis (resolution, not resolution - 1)
    pub heightmap_resolution: [u32; 2],
    pub alphamap_resolution: [u32; 2],
    pub alphamap_layers: u32,

    pub initial_height: f32,

    pub undo_history_depth: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            terrain_dimensions: [1024.0, 256.0, 1024.0],
            heightmap_resolution: [513, 513],
            alphamap_resolution: [512, 512],
            alphamap_layers: 4,
            initial_height: 0.0,
            undo_history_depth: 64,
        }
    }
}

impl TerrainConfig {
    pub fn load_from_file<P: AsRef<Path>>(file_path: P) -> anyhow::Result<TerrainConfig> {
        let file_path = file_path.as_ref();
        let contents = fs::read_to_string(file_path)
            .with_context(|| format!("failed to read terrain config {}", file_path.display()))?;

        let config = Self::from_ron_str(&contents)
            .with_context(|| format!("failed to parse terrain config {}", file_path.display()))?;

        info!("loaded terrain config {}", file_path.display());
        Ok(config)
    }

    pub fn from_ron_str(contents: &str) -> anyhow::Result<TerrainConfig> {
        let config: TerrainConfig = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn validate(&self) -> TerrainEditResult<()> {
        let resolutions = [self.heightmap_resolution, self.alphamap_resolution];
        if resolutions.iter().flatten().any(|samples| *samples < 2) {
            return Err(TerrainEditError::InvalidParameter(
                "terrain grids need at least two samples per axis".into(),
            ));
        }

        if self.alphamap_layers == 0 {
            return Err(TerrainEditError::InvalidParameter(
                "terrain needs at least one alphamap layer".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_height) {
            return Err(TerrainEditError::InvalidParameter(format!(
                "initial height {} is outside [0, 1]",
                self.initial_height
            )));
        }

        if self.terrain_dimensions.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(TerrainEditError::InvalidParameter(
                "terrain dimensions must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn set_heightmap_resolution(mut self, width: u32, height: u32) -> Self {
        self.heightmap_resolution = [width, height];
        self
    }

    pub fn set_alphamap_resolution(mut self, width: u32, height: u32) -> Self {
        self.alphamap_resolution = [width, height];
        self
    }

    pub fn set_alphamap_layers(mut self, layers: u32) -> Self {
        self.alphamap_layers = layers;
        self
    }

    pub fn set_initial_height(mut self, height: f32) -> Self {
        self.initial_height = height;
        self
    }

    pub fn get_terrain_size(&self) -> Vec3 {
        Vec3::from_array(self.terrain_dimensions)
    }
}
