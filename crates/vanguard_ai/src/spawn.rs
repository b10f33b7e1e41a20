//! Agent setup: сборка компонентов агента + проверка зависимостей.
//!
//! Единственная фатальная ошибка ядра: отсутствующая конфигурационная
//! зависимость (нет walkable поверхности, пустой loadout). Такой агент всё
//! равно спавнится (тело участвует в мире), но с `AiDisabled` и громким
//! ERROR в логе.

use bevy::prelude::*;
use thiserror::Error;

use crate::ai::{AiDisabled, PatrolRoute, Perception, StateMachine, TacticalPositioning};
use crate::combat::WeaponEngagement;
use crate::components::{Actor, Health, NavAgent};
use crate::config::AgentConfig;
use crate::sound::SoundPropagation;
use crate::spatial::{layers, Obstacle, SpatialBody, WalkableArea};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentSetupError {
    #[error("no WalkableArea resource in world: agent AI cannot navigate")]
    MissingWalkableArea,

    #[error("no walkable surface under agent {entity:?} at {position:?}")]
    NoWalkableSurface { entity: Entity, position: Vec3 },

    #[error("agent {entity:?} has an empty weapon loadout")]
    EmptyLoadout { entity: Entity },
}

/// Точка стоит на полу и не внутри препятствия
fn surface_under(world: &mut World, position: Vec3) -> Result<Option<Vec3>, AgentSetupError> {
    let walkable = *world
        .get_resource::<WalkableArea>()
        .ok_or(AgentSetupError::MissingWalkableArea)?;

    if !walkable.contains_xz(position) {
        return Ok(None);
    }

    let mut obstacles = world.query::<(&Transform, &Obstacle)>();
    let blocked = obstacles.iter(world).any(|(transform, obstacle)| {
        let min = transform.translation - obstacle.half_extents;
        let max = transform.translation + obstacle.half_extents;
        position.x >= min.x && position.x <= max.x && position.z >= min.z && position.z <= max.z
    });

    Ok((!blocked).then(|| Vec3::new(position.x, walkable.ground_height, position.z)))
}

/// Спавн AI агента
///
/// При ошибке setup тело всё равно создаётся (с `AiDisabled`), ошибка
/// возвращается и логируется.
pub fn spawn_agent(world: &mut World, config: &AgentConfig, position: Vec3) -> Result<Entity, AgentSetupError> {
    let entity = world
        .spawn((
            Actor {
                faction_id: config.faction_id,
            },
            Health::new(config.max_health),
            Transform::from_translation(position),
            SpatialBody::default(),
        ))
        .id();

    let grounded = surface_under(world, position).and_then(|surface| {
        let surface = surface.ok_or(AgentSetupError::NoWalkableSurface { entity, position })?;
        if config.loadout.is_empty() {
            return Err(AgentSetupError::EmptyLoadout { entity });
        }
        Ok(surface)
    });

    let surface = match grounded {
        Ok(surface) => surface,
        Err(error) => {
            crate::log_error(&format!("❌ agent {:?} setup failed: {}: AI disabled", entity, error));
            world.entity_mut(entity).insert(AiDisabled {
                reason: error.to_string(),
            });
            return Err(error);
        }
    };

    world.entity_mut(entity).insert((
        Transform::from_translation(surface),
        NavAgent::new(config.move_speed)
            .with_turn_rate(config.turn_rate_deg)
            .at(surface),
        Perception::new(config.perception.clone()),
        StateMachine::new(config.state_machine.clone(), PatrolRoute::new(config.patrol.clone())),
        config.role,
        TacticalPositioning::new(config.positioning.clone()),
        WeaponEngagement::new(config.loadout.clone()),
    ));

    match world.get_resource_mut::<SoundPropagation>() {
        Some(mut sound) => sound.register_listener(entity),
        None => crate::log_warning(&format!(
            "⚠️ agent {:?} spawned without SoundPropagation resource (deaf)",
            entity
        )),
    }

    crate::log_info(&format!(
        "🤖 agent {:?} spawned at {:?} (faction {}, {} weapons, patrol {} pts)",
        entity,
        surface,
        config.faction_id,
        config.loadout.len(),
        config.patrol.len()
    ));

    Ok(entity)
}

/// Спавн не-AI цели (игрок / манекен)
pub fn spawn_target(world: &mut World, faction_id: u64, max_health: u32, position: Vec3) -> Entity {
    world
        .spawn((
            Actor { faction_id },
            Health::new(max_health),
            Transform::from_translation(position),
            SpatialBody {
                layers: layers::PLAYERS,
                ..Default::default()
            },
        ))
        .id()
}
