//! Weapon Engagement: rate-limited ranged + melee.
//!
//! Оружие: tagged variants (`WeaponCapability`), у каждого свой cooldown
//! (`ready_at`, время симуляции). Урон наносит система (`engagement.rs`) по
//! результату `EngagementOutcome` / `MeleeOutcome`.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::ai::ThreatView;
use crate::components::horizontal_distance;
use crate::sound::{SoundEvent, SoundPropagation};
use crate::spatial::{RayHitKind, SpatialQuery};

/// Огнестрел
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct RangedWeapon {
    pub damage: u32,
    /// Интервал между выстрелами (секунды)
    pub fire_interval: f32,
    /// Дальность damage луча (метры)
    pub range: f32,
    /// Полный угол разброса стоя (градусы)
    pub spread_deg: f32,
    /// Полный угол разброса в движении (градусы)
    pub moving_spread_deg: f32,
    /// Выше этой собственной скорости: moving spread
    pub moving_speed_threshold: f32,
    pub gunshot_intensity: f32,
    pub gunshot_radius: f32,
    pub predictive_aim: bool,
    /// Lead только при confidence выше
    pub predict_confidence_threshold: f32,
    /// Lead только при боковой скорости цели выше (м/с)
    pub min_lateral_speed: f32,
    /// Максимальная длина lead (метры)
    pub max_lead: f32,
    /// Ближе этой дистанции: вторичный clamp lead
    pub close_range_distance: f32,
    pub close_range_max_lead: f32,
    /// Высота точки прицеливания над base цели
    pub aim_height: f32,
    /// Высота ствола над base стрелка
    pub muzzle_height: f32,
    #[serde(skip)]
    ready_at: f32,
}

impl Default for RangedWeapon {
    fn default() -> Self {
        Self {
            damage: 12,
            fire_interval: 0.25,
            range: 30.0,
            spread_deg: 2.0,
            moving_spread_deg: 6.0,
            moving_speed_threshold: 0.5,
            gunshot_intensity: 0.9,
            gunshot_radius: 40.0,
            predictive_aim: true,
            predict_confidence_threshold: 0.5,
            min_lateral_speed: 0.5,
            max_lead: 2.0,
            close_range_distance: 5.0,
            close_range_max_lead: 0.5,
            aim_height: 1.2,
            muzzle_height: 1.5,
            ready_at: 0.0,
        }
    }
}

impl RangedWeapon {
    pub fn is_ready(&self, now: f32) -> bool {
        now >= self.ready_at
    }

    pub fn ready_at(&self) -> f32 {
        self.ready_at
    }

    /// Разброс (радианы, полный угол) с учётом собственной скорости
    pub fn current_spread(&self, own_speed: f32) -> f32 {
        let degrees = if own_speed > self.moving_speed_threshold {
            self.moving_spread_deg
        } else {
            self.spread_deg
        };
        degrees.max(0.0).to_radians()
    }
}

/// Холодное оружие
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct MeleeWeapon {
    pub damage: u32,
    /// Дистанция удара (метры, по XZ)
    pub range: f32,
    pub cooldown: f32,
    /// Задержка удара после замаха (0: мгновенно)
    pub hit_delay: f32,
    #[serde(skip)]
    ready_at: f32,
}

impl Default for MeleeWeapon {
    fn default() -> Self {
        Self {
            damage: 25,
            range: 1.8,
            cooldown: 1.0,
            hit_delay: 0.3,
            ready_at: 0.0,
        }
    }
}

impl MeleeWeapon {
    pub fn is_ready(&self, now: f32) -> bool {
        now >= self.ready_at
    }

    pub fn ready_at(&self) -> f32 {
        self.ready_at
    }
}

/// Боевая способность агента
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub enum WeaponCapability {
    Ranged(RangedWeapon),
    Melee(MeleeWeapon),
}

/// Попадание damage луча
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotHit {
    /// Root entity того, в кого попали
    pub target: Entity,
    pub point: Vec3,
}

/// Результат `engage_target`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngagementOutcome {
    /// Нет ranged оружия в loadout
    NoWeapon,
    CoolingDown,
    NoTarget,
    /// Clear-shot check не прошёл (cooldown не тронут)
    Blocked { by: Option<Entity> },
    Fired {
        aim_point: Vec3,
        direction: Vec3,
        hit: Option<ShotHit>,
        damage: u32,
    },
}

/// Результат `engage_melee`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeleeOutcome {
    NoWeapon,
    CoolingDown,
    OutOfRange,
    /// Мгновенный удар
    Hit { target: Entity, damage: u32 },
    /// Удар отложен до `at`
    Scheduled { target: Entity, damage: u32, at: f32 },
}

/// Отложенный melee удар (payload для ScheduledEvents)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMeleeHit {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
    pub origin: Vec3,
}

/// Точка прицеливания с predictive lead
///
/// Lead применяется только если: predictive_aim, confidence > threshold,
/// цель в пределах range, боковая скорость (перпендикулярно линии огня) >
/// min_lateral_speed. Lead = predicted − last_seen, clamp по max_lead и
/// (на близкой дистанции) по close_range_max_lead.
pub fn compute_aim_point(weapon: &RangedWeapon, origin: Vec3, threat: &ThreatView) -> Vec3 {
    let base = threat.last_seen + Vec3::Y * weapon.aim_height;
    let to_target = base - origin;
    let distance = to_target.length();

    if !weapon.predictive_aim
        || threat.confidence <= weapon.predict_confidence_threshold
        || distance > weapon.range
    {
        return base;
    }

    let line = to_target.normalize_or_zero();
    let lateral = threat.velocity - line * threat.velocity.dot(line);
    if lateral.length() <= weapon.min_lateral_speed {
        return base;
    }

    let mut lead = (threat.predicted - threat.last_seen).clamp_length_max(weapon.max_lead.max(0.0));
    if distance < weapon.close_range_distance {
        lead = lead.clamp_length_max(weapon.close_range_max_lead.max(0.0));
    }

    base + lead
}

/// Случайное направление внутри конуса `spread` (полный угол) вокруг `direction`
pub fn apply_spread(direction: Vec3, spread: f32, rng: &mut impl Rng) -> Vec3 {
    let Some(direction) = direction.try_normalize() else {
        return direction;
    };
    let half = spread * 0.5;
    if half <= 0.0 {
        return direction;
    }

    let roll = rng.gen_range(0.0..TAU);
    let offset = rng.gen_range(0.0..=half);
    let axis = Quat::from_axis_angle(direction, roll) * direction.any_orthonormal_vector();

    (Quat::from_axis_angle(axis, offset) * direction).normalize()
}

/// Оружие агента + статистика
#[derive(Component, Debug, Clone, Default)]
pub struct WeaponEngagement {
    loadout: Vec<WeaponCapability>,
    shots_fired: u32,
    shots_blocked: u32,
    hits: u32,
    melee_swings: u32,
}

impl WeaponEngagement {
    pub fn new(loadout: Vec<WeaponCapability>) -> Self {
        Self {
            loadout,
            ..Default::default()
        }
    }

    pub fn loadout(&self) -> &[WeaponCapability] {
        &self.loadout
    }

    pub fn is_empty(&self) -> bool {
        self.loadout.is_empty()
    }

    pub fn ranged(&self) -> Option<&RangedWeapon> {
        self.loadout.iter().find_map(|w| match w {
            WeaponCapability::Ranged(r) => Some(r),
            WeaponCapability::Melee(_) => None,
        })
    }

    pub fn melee(&self) -> Option<&MeleeWeapon> {
        self.loadout.iter().find_map(|w| match w {
            WeaponCapability::Melee(m) => Some(m),
            WeaponCapability::Ranged(_) => None,
        })
    }

    fn ranged_mut(&mut self) -> Option<&mut RangedWeapon> {
        self.loadout.iter_mut().find_map(|w| match w {
            WeaponCapability::Ranged(r) => Some(r),
            WeaponCapability::Melee(_) => None,
        })
    }

    fn melee_mut(&mut self) -> Option<&mut MeleeWeapon> {
        self.loadout.iter_mut().find_map(|w| match w {
            WeaponCapability::Melee(m) => Some(m),
            WeaponCapability::Ranged(_) => None,
        })
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    pub fn shots_blocked(&self) -> u32 {
        self.shots_blocked
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn melee_swings(&self) -> u32 {
        self.melee_swings
    }

    /// Цель в пределах melee и есть чем бить
    pub fn prefers_melee(&self, origin: Vec3, target_position: Vec3) -> bool {
        self.melee()
            .is_some_and(|m| horizontal_distance(origin, target_position) <= m.range)
    }

    /// Ranged атака по primary угрозе
    ///
    /// `target_valid == false` (despawned / incapacitated): no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn engage_target(
        &mut self,
        now: f32,
        shooter: Entity,
        position: Vec3,
        own_speed: f32,
        threat: Option<&ThreatView>,
        target_valid: bool,
        spatial: &impl SpatialQuery,
        sound: &mut SoundPropagation,
        rng: &mut impl Rng,
    ) -> EngagementOutcome {
        let Some(weapon) = self.ranged_mut() else {
            return EngagementOutcome::NoWeapon;
        };
        if !weapon.is_ready(now) {
            return EngagementOutcome::CoolingDown;
        }
        let Some(threat) = threat.filter(|_| target_valid) else {
            return EngagementOutcome::NoTarget;
        };

        let origin = position + Vec3::Y * weapon.muzzle_height;
        let aim_point = compute_aim_point(weapon, origin, threat);
        let to_aim = aim_point - origin;
        let aim_distance = to_aim.length();

        // Clear shot: первое пересечение: сама цель (или пустота до точки с lead)
        if let Some(hit) = spatial.raycast(origin, to_aim, aim_distance, Some(shooter)) {
            let blocker = match hit.kind {
                RayHitKind::Body { root, .. } if root == threat.target => None,
                RayHitKind::Body { root, .. } => Some(Some(root)),
                RayHitKind::Obstacle(entity) => Some(Some(entity)),
            };
            if let Some(by) = blocker {
                self.shots_blocked += 1;
                return EngagementOutcome::Blocked { by };
            }
        }

        sound.emit(
            SoundEvent::new(origin, weapon.gunshot_intensity, weapon.gunshot_radius).from_source(shooter),
        );

        let direction = apply_spread(to_aim, weapon.current_spread(own_speed), rng);
        let hit = spatial
            .raycast(origin, direction, weapon.range, Some(shooter))
            .and_then(|h| h.body_root().map(|target| ShotHit { target, point: h.point }));

        weapon.ready_at = now + weapon.fire_interval;
        let damage = weapon.damage;

        self.shots_fired += 1;
        if hit.is_some() {
            self.hits += 1;
        }

        EngagementOutcome::Fired {
            aim_point,
            direction,
            hit,
            damage,
        }
    }

    /// Melee удар (hit_delay > 0: через scheduled queue)
    pub fn engage_melee(&mut self, now: f32, position: Vec3, target: Entity, target_position: Vec3) -> MeleeOutcome {
        let Some(weapon) = self.melee_mut() else {
            return MeleeOutcome::NoWeapon;
        };
        if !weapon.is_ready(now) {
            return MeleeOutcome::CoolingDown;
        }
        if horizontal_distance(position, target_position) > weapon.range {
            return MeleeOutcome::OutOfRange;
        }

        weapon.ready_at = now + weapon.cooldown;
        let damage = weapon.damage;
        let hit_delay = weapon.hit_delay;
        self.melee_swings += 1;

        if hit_delay > 0.0 {
            MeleeOutcome::Scheduled {
                target,
                damage,
                at: now + hit_delay,
            }
        } else {
            MeleeOutcome::Hit { target, damage }
        }
    }
}
