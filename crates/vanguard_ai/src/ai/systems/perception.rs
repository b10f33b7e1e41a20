//! Perception system: sense + threat memory + alertness decay.

use bevy::prelude::*;

use crate::ai::{AiDisabled, ObserverPose, Perception};
use crate::components::{Actor, Damageable, Health};
use crate::spatial::SpatialSnapshot;
use crate::timeline::SimClock;

/// Система: тик восприятия всех активных агентов
///
/// Цель валидна, пока entity существует и (если есть Health) не incapacitated.
/// Despawned / мёртвые цели удаляются из памяти в этом же тике.
pub fn update_perception(
    mut agents: Query<(Entity, &Transform, Option<&Actor>, &mut Perception), Without<AiDisabled>>,
    targets: Query<Option<&Health>>,
    spatial: Res<SpatialSnapshot>,
    clock: Res<SimClock>,
) {
    let is_valid = |target: Entity| match targets.get(target) {
        Ok(Some(health)) => !health.is_incapacitated(),
        Ok(None) => true,
        Err(_) => false,
    };

    for (entity, transform, actor, mut perception) in agents.iter_mut() {
        let pose = ObserverPose {
            position: transform.translation,
            forward: transform.rotation * Vec3::NEG_Z,
            root: entity,
            faction: actor.map(|a| a.faction_id),
        };

        let previous = perception.primary_target();
        perception.tick(clock.now, clock.dt, &pose, &*spatial, is_valid);

        let current = perception.primary_target();
        if current != previous {
            match current {
                Some(target) => crate::log(&format!(
                    "👁️ {:?} primary threat → {:?} (alertness {:.2})",
                    entity,
                    target,
                    perception.alertness()
                )),
                None => crate::log(&format!("👻 {:?} lost primary threat {:?}", entity, previous)),
            }
        }
    }
}
