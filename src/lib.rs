use bevy::prelude::*;

use edit::{
    apply_command_events, apply_tool_edits, EditTerrainEvent, TerrainBrushEvent, TerrainChangedEvent,
    TerrainCommandEvent, TerrainEditFailedEvent,
};
use terrain::initialize_terrain_data;

pub mod affected_area;
pub mod alpha_edit;
pub mod alphamap;
pub mod brush;
pub mod edit;
pub mod error;
pub mod height_edit;
pub mod heightmap;
pub mod raster;
pub mod session;
pub mod smooth;
pub mod terrain;
pub mod terrain_config;
pub mod undo;

pub use brush::{BrushLibrary, BrushMask, BrushPlacement};
pub use edit::EditingTool;
pub use error::{TerrainEditError, TerrainEditResult};
pub use session::EditSession;
pub use terrain::{GridTarget, SculptableTerrainBundle, TerrainChange, TerrainData};
pub use terrain_config::TerrainConfig;
pub use undo::{UndoHistory, UndoSink};

pub struct TerrainSculptPlugin {}

impl Default for TerrainSculptPlugin {
    fn default() -> Self {
        Self {}
    }
}

impl Plugin for TerrainSculptPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BrushLibrary>();

        app.add_event::<EditTerrainEvent>();
        app.add_event::<TerrainCommandEvent>();
        app.add_event::<TerrainChangedEvent>();
        app.add_event::<TerrainBrushEvent>();
        app.add_event::<TerrainEditFailedEvent>();

        app.add_systems(
            Update,
            (initialize_terrain_data, apply_tool_edits, apply_command_events).chain(),
        );
    }
}
