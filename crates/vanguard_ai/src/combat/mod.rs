//! Combat module: weapon engagement + damage application.
//!
//! ECS ответственность:
//! - Weapon state: loadout, cooldown timestamps
//! - Combat rules: clear-shot gate, predictive lead, melee range
//! - Events: DamageDealt
//!
//! Health модель: внешний контракт (`Damageable`).

pub mod damage;
pub mod engagement;
pub mod weapon;


// Re-export основных типов
pub use damage::{apply_damage, DamageDealt};
pub use weapon::{
    compute_aim_point, EngagementOutcome, MeleeOutcome, MeleeWeapon, PendingMeleeHit, RangedWeapon, ShotHit,
    WeaponCapability, WeaponEngagement,
};

use bevy::prelude::*;

use crate::timeline::ScheduledEvents;
use crate::SimulationSet;

/// Combat Plugin
///
/// Порядок выполнения (внутри SimulationSet::Combat):
/// 1. update_weapon_engagement: ranged/melee атаки Combat агентов
/// 2. resolve_scheduled_melee_hits: отложенные удары
/// 3. report_damage_to_perception: DamageDealt → alertness жертвы
///
/// `disable_incapacitated_agents`: в SimulationSet::Cleanup (после locomotion).
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageDealt>()
            .init_resource::<ScheduledEvents<PendingMeleeHit>>();

        app.add_systems(
            FixedUpdate,
            (
                engagement::update_weapon_engagement,
                damage::resolve_scheduled_melee_hits,
                damage::report_damage_to_perception,
            )
                .chain() // Последовательное выполнение для детерминизма
                .in_set(SimulationSet::Combat),
        );

        app.add_systems(
            FixedUpdate,
            damage::disable_incapacitated_agents.in_set(SimulationSet::Cleanup),
        );
    }
}
