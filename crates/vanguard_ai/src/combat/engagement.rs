//! Weapon engagement system (Combat агенты).

use bevy::prelude::*;

use crate::ai::{AgentState, AiDisabled, Perception, StateMachine};
use crate::combat::damage::{apply_damage, DamageDealt};
use crate::combat::weapon::{EngagementOutcome, MeleeOutcome, PendingMeleeHit, WeaponEngagement};
use crate::components::{Damageable, Health, NavAgent, Navigation};
use crate::sound::SoundPropagation;
use crate::spatial::{SpatialQuery, SpatialSnapshot};
use crate::timeline::{ScheduledEvents, SimClock};
use crate::DeterministicRng;

/// Система: атака primary угрозы
///
/// Melee, если цель в пределах melee range и есть melee оружие, иначе ranged.
/// Выстрелы → gunshot в outbox SoundPropagation (доставка в `propagate_sounds`).
#[allow(clippy::too_many_arguments)]
pub fn update_weapon_engagement(
    mut agents: Query<
        (Entity, &Perception, &StateMachine, &Transform, &NavAgent, &mut WeaponEngagement),
        Without<AiDisabled>,
    >,
    mut healths: Query<&mut Health>,
    spatial: Res<SpatialSnapshot>,
    clock: Res<SimClock>,
    mut rng: ResMut<DeterministicRng>,
    mut sound: ResMut<SoundPropagation>,
    mut pending: ResMut<ScheduledEvents<PendingMeleeHit>>,
    mut damage_events: EventWriter<DamageDealt>,
) {
    for (entity, perception, fsm, transform, nav, mut engagement) in agents.iter_mut() {
        if fsm.state() != AgentState::Combat {
            continue;
        }

        let snapshot = perception.snapshot(clock.now);
        let Some(threat) = snapshot.threat else {
            continue;
        };

        let target_valid = match healths.get(threat.target) {
            Ok(health) => !health.is_incapacitated(),
            Err(_) => spatial.body_position(threat.target).is_some(),
        };
        if !target_valid {
            continue;
        }

        let position = transform.translation;

        if engagement.prefers_melee(position, threat.last_seen) {
            match engagement.engage_melee(clock.now, position, threat.target, threat.last_seen) {
                MeleeOutcome::Hit { target, damage } => {
                    if let Some(dealt) = apply_damage(&mut healths, entity, target, damage, position) {
                        crate::log(&format!("🗡️ {:?} melee hit {:?} for {}", entity, target, damage));
                        damage_events.write(dealt);
                    }
                }
                MeleeOutcome::Scheduled { target, damage, at } => {
                    pending.schedule(
                        at,
                        PendingMeleeHit {
                            attacker: entity,
                            target,
                            damage,
                            origin: position,
                        },
                    );
                }
                MeleeOutcome::NoWeapon | MeleeOutcome::CoolingDown | MeleeOutcome::OutOfRange => {}
            }
            continue;
        }

        let outcome = engagement.engage_target(
            clock.now,
            entity,
            position,
            nav.current_speed(),
            Some(&threat),
            target_valid,
            &*spatial,
            &mut sound,
            &mut rng.rng,
        );

        match outcome {
            EngagementOutcome::Fired { hit: Some(hit), damage, .. } => {
                // Попали не обязательно в primary: урон получает тот, в кого попал луч
                if let Some(dealt) = apply_damage(&mut healths, entity, hit.target, damage, position) {
                    crate::log(&format!(
                        "🔫 {:?} hit {:?} for {} (hp left: {})",
                        entity,
                        hit.target,
                        damage,
                        healths.get(hit.target).map(|h| h.current).unwrap_or(0)
                    ));
                    damage_events.write(dealt);
                }
            }
            EngagementOutcome::Fired { hit: None, .. } => {
                crate::log(&format!("🔫 {:?} fired at {:?}: miss", entity, threat.target));
            }
            EngagementOutcome::Blocked { by } => {
                crate::log(&format!(
                    "🚫 {:?} shot at {:?} blocked by {:?}",
                    entity, threat.target, by
                ));
            }
            EngagementOutcome::NoWeapon | EngagementOutcome::CoolingDown | EngagementOutcome::NoTarget => {}
        }
    }
}
