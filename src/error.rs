use thiserror::Error;

/// Everything that can stop a terrain edit before it touches a grid.
///
/// Nothing here is fatal: a failed edit is a frame with no visible change.
#[derive(Debug, Error)]
pub enum TerrainEditError {
    #[error("brush size {0} is outside [0, 1]")]
    InvalidBrushSize(f32),

    #[error("brush center ({x}, {y}) is outside [0, 1]")]
    InvalidBrushCenter { x: f32, y: f32 },

    #[error("brush mask `{0}` is not loaded")]
    MissingBrushMask(String),

    #[error("brush mask image has no texels")]
    EmptyBrushMask,

    #[error("layer {layer} is out of range, terrain has {layer_count} layers")]
    LayerOutOfRange { layer: usize, layer_count: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("patch {patch_width}x{patch_height}x{patch_channels} does not fit the grid at ({x}, {y})")]
    PatchMismatch {
        x: usize,
        y: usize,
        patch_width: usize,
        patch_height: usize,
        patch_channels: usize,
    },

    #[error("undo record was taken on grid generation {record_generation}, terrain is at {grid_generation}")]
    StaleRecord {
        record_generation: u64,
        grid_generation: u64,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl TerrainEditError {
    /// True for the errors a caller can fix by passing different arguments.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(
            self,
            TerrainEditError::InvalidBrushSize(_)
                | TerrainEditError::InvalidBrushCenter { .. }
                | TerrainEditError::MissingBrushMask(_)
                | TerrainEditError::EmptyBrushMask
                | TerrainEditError::LayerOutOfRange { .. }
                | TerrainEditError::InvalidParameter(_)
        )
    }
}

pub type TerrainEditResult<T> = Result<T, TerrainEditError>;
