//! Damage application + реакции на урон.
//!
//! Урон применяется только через `Damageable` контракт. После применения
//! пишется `DamageDealt`; жертва получает damage report в perception.

use bevy::prelude::*;

use crate::ai::{AiDisabled, Perception, StateMachine};
use crate::combat::weapon::PendingMeleeHit;
use crate::components::{Damageable, Health, NavAgent, Navigation};
use crate::sound::SoundPropagation;
use crate::timeline::{ScheduledEvents, SimClock};

/// Событие: урон нанесен
#[derive(Event, Debug, Clone, PartialEq)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
    /// Откуда пришёл удар (позиция стрелка / бойца)
    pub origin: Vec3,
    pub target_incapacitated: bool,
}

/// Применить урон к damage-capable entity
///
/// Уже incapacitated цели урон не получают (None).
pub fn apply_damage(
    healths: &mut Query<&mut Health>,
    attacker: Entity,
    target: Entity,
    damage: u32,
    origin: Vec3,
) -> Option<DamageDealt> {
    let mut health = healths.get_mut(target).ok()?;
    if health.is_incapacitated() {
        return None;
    }

    health.take_damage(damage);
    Some(DamageDealt {
        attacker,
        target,
        damage,
        origin,
        target_incapacitated: health.is_incapacitated(),
    })
}

/// Система: отложенные melee удары, чьё время пришло
pub fn resolve_scheduled_melee_hits(
    mut pending: ResMut<ScheduledEvents<PendingMeleeHit>>,
    mut healths: Query<&mut Health>,
    mut damage_events: EventWriter<DamageDealt>,
    clock: Res<SimClock>,
) {
    for hit in pending.drain_due(clock.now) {
        match apply_damage(&mut healths, hit.attacker, hit.target, hit.damage, hit.origin) {
            Some(dealt) => {
                crate::log(&format!(
                    "🗡️ {:?} melee hit {:?} for {} (delayed)",
                    hit.attacker, hit.target, hit.damage
                ));
                damage_events.write(dealt);
            }
            // Цель исчезла или уже выведена из строя за время замаха
            None => crate::log(&format!(
                "🗡️ {:?} delayed melee hit on {:?} discarded (target gone)",
                hit.attacker, hit.target
            )),
        }
    }
}

/// Система: DamageDealt → receive_damage_report жертвы
pub fn report_damage_to_perception(
    mut damage_events: EventReader<DamageDealt>,
    mut victims: Query<&mut Perception, Without<AiDisabled>>,
) {
    for event in damage_events.read() {
        if let Ok(mut perception) = victims.get_mut(event.target) {
            perception.receive_damage_report(event.origin, event.damage);
        }
    }
}

/// Система: отключение AI у incapacitated агентов
///
/// Агент останавливается, снимается с прослушки звуков и помечается
/// `AiDisabled` (вставка через Commands: действует со следующего тика).
pub fn disable_incapacitated_agents(
    mut commands: Commands,
    mut agents: Query<(Entity, &Health, Option<&mut NavAgent>), (With<StateMachine>, Without<AiDisabled>)>,
    mut sound: ResMut<SoundPropagation>,
) {
    for (entity, health, nav) in agents.iter_mut() {
        if !health.is_incapacitated() {
            continue;
        }

        if let Some(mut nav) = nav {
            nav.abort_path();
            nav.stop();
        }
        sound.unregister_listener(entity);
        commands.entity(entity).insert(AiDisabled {
            reason: "incapacitated".to_string(),
        });

        crate::log(&format!("💀 {:?} incapacitated: AI disabled", entity));
    }
}
