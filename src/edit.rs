use core::fmt::{self, Display, Formatter};

use bevy::ecs::entity::Entity;
use bevy::ecs::event::Event;
use bevy::prelude::*;

use crate::alpha_edit::LayerPaint;
use crate::brush::{BrushLibrary, BrushPlacement};
use crate::error::{TerrainEditError, TerrainEditResult};
use crate::session::EditSession;
use crate::smooth::SmoothSettings;
use crate::terrain::{GridTarget, TerrainChange, TerrainData};
use crate::undo::UndoHistory;

#[derive(Debug, Clone, PartialEq)]
pub enum EditingTool {
    /// raise (positive delta) or lower, unbounded
    RaiseLower { delta: f32 },
    /// converge on `target` by at most `delta` per stroke
    SetHeight { target: f32, delta: f32 },
    Smooth(SmoothSettings),
    PaintLayer(LayerPaint),
}

impl EditingTool {
    pub fn target(&self) -> GridTarget {
        match self {
            EditingTool::PaintLayer(_) => GridTarget::Alphamap,
            _ => GridTarget::Heights,
        }
    }

    pub fn validate(&self, layer_count: usize) -> TerrainEditResult<()> {
        match self {
            EditingTool::RaiseLower { delta } => check_finite("delta", *delta),
            EditingTool::SetHeight { target, delta } => {
                check_unit("target height", *target)?;
                check_finite("delta", *delta)
            }
            EditingTool::Smooth(settings) => settings.validate(),
            EditingTool::PaintLayer(paint) => paint.validate(layer_count),
        }
    }
}

fn check_finite(name: &str, value: f32) -> TerrainEditResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TerrainEditError::InvalidParameter(format!("{name} must be finite, got {value}")))
    }
}

fn check_unit(name: &str, value: f32) -> TerrainEditResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TerrainEditError::InvalidParameter(format!(
            "{name} {value} is outside [0, 1]"
        )))
    }
}

impl Display for EditingTool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            EditingTool::RaiseLower { .. } => "RaiseLower",
            EditingTool::SetHeight { .. } => "SetHeight",
            EditingTool::Smooth(SmoothSettings {
                direction_degrees: Some(_),
                ..
            }) => "DirectedSmooth",
            EditingTool::Smooth(_) => "Smooth",
            EditingTool::PaintLayer(_) => "PaintLayer",
        };

        write!(f, "{}", label)
    }
}

// one stroke sample per event, the host sends EndStroke when the button is released
#[derive(Event, Debug, Clone)]
pub enum EditTerrainEvent {
    Stroke {
        entity: Entity,
        tool: EditingTool,
        brush: String,
        placement: BrushPlacement,
    },
    EndStroke {
        entity: Entity,
    },
    EyeDrop {
        entity: Entity,
        center: Vec2,
    },
}

impl EditTerrainEvent {
    pub fn entity(&self) -> Entity {
        match self {
            EditTerrainEvent::Stroke { entity, .. }
            | EditTerrainEvent::EndStroke { entity }
            | EditTerrainEvent::EyeDrop { entity, .. } => *entity,
        }
    }
}

#[derive(Event, Debug, Clone)]
pub enum TerrainBrushEvent {
    EyeDrop {
        entity: Entity,
        height: f32,
        layer_weights: Vec<f32>,
    },
}

#[derive(Event, Debug, Clone)]
pub enum TerrainCommandEvent {
    Undo(Entity),
    Redo(Entity),
    CancelGesture(Entity),
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct TerrainChangedEvent {
    pub entity: Entity,
    pub change: TerrainChange,
}

#[derive(Event, Debug)]
pub struct TerrainEditFailedEvent {
    pub entity: Entity,
    pub error: TerrainEditError,
}

pub fn apply_tool_edits(
    brushes: Res<BrushLibrary>,

    mut terrain_query: Query<(&mut TerrainData, &mut EditSession, &mut UndoHistory)>,

    mut ev_reader: EventReader<EditTerrainEvent>,

    mut changed_writer: EventWriter<TerrainChangedEvent>,
    mut brush_writer: EventWriter<TerrainBrushEvent>,
    mut failed_writer: EventWriter<TerrainEditFailedEvent>,
) {
    for ev in ev_reader.read() {
        let entity = ev.entity();

        let Ok((mut terrain_data, mut session, mut undo_history)) = terrain_query.get_mut(entity) else {
            warn!("terrain edit event for {:?}, which is not a sculptable terrain", entity);
            continue;
        };

        match ev {
            EditTerrainEvent::Stroke {
                tool,
                brush,
                placement,
                ..
            } => {
                let result = brushes.get(brush).and_then(|mask| {
                    session.stroke(&mut terrain_data, tool, placement, mask, &mut *undo_history)
                });

                match result {
                    Ok(Some(change)) => {
                        changed_writer.send(TerrainChangedEvent { entity, change });
                    }
                    Ok(None) => {}
                    Err(error) => {
                        warn!("-- {} -- terrain edit rejected: {}", tool, error);
                        failed_writer.send(TerrainEditFailedEvent { entity, error });
                    }
                }
            }

            EditTerrainEvent::EndStroke { .. } => {
                if session.end_gesture(&terrain_data, &mut *undo_history) {
                    info!("terrain edit recorded, {} undo steps", undo_history.undo_count());
                }
            }

            EditTerrainEvent::EyeDrop { center, .. } => {
                match EditSession::eyedrop(&terrain_data, *center) {
                    Ok(sample) => {
                        brush_writer.send(TerrainBrushEvent::EyeDrop {
                            entity,
                            height: sample.height,
                            layer_weights: sample.layer_weights,
                        });
                    }
                    Err(error) => {
                        failed_writer.send(TerrainEditFailedEvent { entity, error });
                    }
                }
            }
        }
    }
}

pub fn apply_command_events(
    mut terrain_query: Query<(&mut TerrainData, &mut EditSession, &mut UndoHistory)>,

    mut ev_reader: EventReader<TerrainCommandEvent>,

    mut changed_writer: EventWriter<TerrainChangedEvent>,
    mut failed_writer: EventWriter<TerrainEditFailedEvent>,
) {
    for ev in ev_reader.read() {
        let entity = match ev {
            TerrainCommandEvent::Undo(entity)
            | TerrainCommandEvent::Redo(entity)
            | TerrainCommandEvent::CancelGesture(entity) => *entity,
        };

        let Ok((mut terrain_data, mut session, mut undo_history)) = terrain_query.get_mut(entity) else {
            warn!("terrain command for {:?}, which is not a sculptable terrain", entity);
            continue;
        };

        let result = match ev {
            TerrainCommandEvent::CancelGesture(_) => {
                session.cancel_gesture();
                continue;
            }
            TerrainCommandEvent::Undo(_) => {
                // a gesture still in flight is finished before it can be undone
                session.end_gesture(&terrain_data, &mut *undo_history);
                undo_history.undo(&mut terrain_data)
            }
            TerrainCommandEvent::Redo(_) => {
                session.end_gesture(&terrain_data, &mut *undo_history);
                undo_history.redo(&mut terrain_data)
            }
        };

        match result {
            Ok(Some(change)) => {
                session.notify_change(&change);
                changed_writer.send(TerrainChangedEvent { entity, change });
            }
            Ok(None) => {
                debug!("nothing to replay for {:?}", ev);
            }
            Err(error) => {
                failed_writer.send(TerrainEditFailedEvent { entity, error });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_targets() {
        assert_eq!(EditingTool::RaiseLower { delta: 0.1 }.target(), GridTarget::Heights);
        assert_eq!(
            EditingTool::Smooth(SmoothSettings::default()).target(),
            GridTarget::Heights
        );

        let paint = EditingTool::PaintLayer(LayerPaint {
            layer: 1,
            delta: 0.5,
            target: 1.0,
        });
        assert_eq!(paint.target(), GridTarget::Alphamap);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let set = EditingTool::SetHeight {
            target: 1.2,
            delta: 0.1,
        };
        assert!(set.validate(4).is_err());

        let raise = EditingTool::RaiseLower { delta: f32::NAN };
        assert!(raise.validate(4).is_err());

        let paint = EditingTool::PaintLayer(LayerPaint {
            layer: 4,
            delta: 0.5,
            target: 1.0,
        });
        assert!(matches!(
            paint.validate(4),
            Err(TerrainEditError::LayerOutOfRange {
                layer: 4,
                layer_count: 4
            })
        ));
        assert!(paint.validate(5).is_ok());
    }

    #[test]
    fn test_display_labels() {
        let directed = EditingTool::Smooth(SmoothSettings {
            direction_degrees: Some(45.0),
            ..Default::default()
        });

        assert_eq!(directed.to_string(), "DirectedSmooth");
        assert_eq!(EditingTool::RaiseLower { delta: -0.1 }.to_string(), "RaiseLower");
    }
}
