//! Tactical Positioning: hold / relocate + плавный поворот к угрозе.
//!
//! Кандидаты семплируются на кольце вокруг текущей позиции агента,
//! проецируются на walkable поверхность и оцениваются:
//! `w_distance / (1 + |d − preferred|) + w_isolation / (1 + neighbours) + w_los × clear`.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use super::perception::ThreatView;
use super::role::RoleParameters;
use crate::components::{horizontal_distance, Navigation};
use crate::spatial::{layers, SpatialQuery};

/// Параметры позиционирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct PositioningConfig {
    /// Допустимое отклонение от preferred_distance (метры)
    pub range_tolerance: f32,
    /// Кольцо семплирования вокруг агента
    pub ring_min: f32,
    pub ring_max: f32,
    pub sample_count: usize,
    pub distance_weight: f32,
    pub isolation_weight: f32,
    pub los_weight: f32,
    /// Радиус, в котором соседи считаются толпой
    pub crowd_radius: f32,
    /// Скорость поворота (градусы/сек)
    pub turn_rate_deg: f32,
    /// Поворот к predicted позиции только при confidence выше
    pub predict_confidence_threshold: f32,
    /// ...и скорости цели выше (м/с)
    pub min_predict_speed: f32,
    /// Высота глаз для LOS проверки кандидата
    pub eye_height: f32,
    /// Высота точки на цели для LOS проверки
    pub target_height: f32,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            range_tolerance: 2.0,
            ring_min: 3.0,
            ring_max: 8.0,
            sample_count: 12,
            distance_weight: 1.0,
            isolation_weight: 0.5,
            los_weight: 1.0,
            crowd_radius: 2.5,
            turn_rate_deg: 270.0,
            predict_confidence_threshold: 0.5,
            min_predict_speed: 0.5,
            eye_height: 1.6,
            target_height: 1.2,
        }
    }
}

/// Результат тика позиционирования
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositioningDecision {
    /// Нет угрозы / нет visual contact: стоп
    Halted,
    /// Репозиция не нужна, поворачиваемся к точке
    Holding { facing: Vec3 },
    /// Новая stand-point
    Relocating { destination: Vec3, score: f32 },
    /// Ни один кандидат не набрал score > 0: держим позицию
    NoCandidate { facing: Vec3 },
}

/// Оценённый кандидат
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub point: Vec3,
    pub score: f32,
}

/// Tactical positioning component
#[derive(Component, Debug, Clone, Default)]
pub struct TacticalPositioning {
    config: PositioningConfig,
    last_reposition_at: Option<f32>,
    /// Выбранная stand-point (None: не в пути)
    stand_point: Option<Vec3>,
    last_decision: Option<PositioningDecision>,
    candidates_evaluated: usize,
}

impl TacticalPositioning {
    pub fn new(config: PositioningConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &PositioningConfig {
        &self.config
    }

    pub fn stand_point(&self) -> Option<Vec3> {
        self.stand_point
    }

    pub fn last_reposition_at(&self) -> Option<f32> {
        self.last_reposition_at
    }

    pub fn last_decision(&self) -> Option<PositioningDecision> {
        self.last_decision
    }

    pub fn candidates_evaluated(&self) -> usize {
        self.candidates_evaluated
    }

    /// Нужна ли репозиция
    ///
    /// Отклонение от preferred дистанции не перезапускает выбор, пока агент
    /// ещё идёт к ранее выбранной stand-point.
    pub fn reposition_due(
        &self,
        now: f32,
        distance: f32,
        role: &RoleParameters,
        nav: &impl Navigation,
    ) -> bool {
        let interval_elapsed = self
            .last_reposition_at
            .is_none_or(|t| now - t >= role.reposition_interval());
        let deviates = (distance - role.preferred_distance()).abs() > self.config.range_tolerance;
        let en_route = self.stand_point.is_some() && nav.has_active_path() && !nav.is_stopped();

        interval_elapsed || (deviates && !en_route)
    }

    /// Куда смотреть: predicted (если цель уверенно движется) или last_seen
    pub fn facing_point(&self, threat: &ThreatView) -> Vec3 {
        let moving = threat.velocity.length() > self.config.min_predict_speed;
        if threat.confidence > self.config.predict_confidence_threshold && moving {
            threat.predicted
        } else {
            threat.last_seen
        }
    }

    /// Один тик позиционирования (только в Combat)
    #[allow(clippy::too_many_arguments)]
    pub fn update_combat_position(
        &mut self,
        now: f32,
        dt: f32,
        threat: Option<&ThreatView>,
        role: &RoleParameters,
        agent: Entity,
        transform: &mut Transform,
        nav: &mut impl Navigation,
        spatial: &impl SpatialQuery,
        rng: &mut impl Rng,
    ) -> PositioningDecision {
        let Some(threat) = threat.filter(|t| t.visual_contact) else {
            nav.stop();
            self.stand_point = None;
            self.last_decision = Some(PositioningDecision::Halted);
            return PositioningDecision::Halted;
        };

        let position = transform.translation;
        let facing = self.facing_point(threat);
        turn_towards(transform, facing, self.config.turn_rate_deg.to_radians() * dt);

        let distance = horizontal_distance(position, threat.last_seen);
        let decision = if !self.reposition_due(now, distance, role, nav) {
            PositioningDecision::Holding { facing }
        } else {
            self.last_reposition_at = Some(now);
            let candidates = self.sample_candidates(position, threat.last_seen, role, agent, spatial, rng);
            self.candidates_evaluated = candidates.len();

            match best_candidate(&candidates) {
                Some(best) => {
                    nav.resume();
                    nav.set_destination(best.point);
                    self.stand_point = Some(best.point);
                    PositioningDecision::Relocating {
                        destination: best.point,
                        score: best.score,
                    }
                }
                None => PositioningDecision::NoCandidate { facing },
            }
        };

        self.last_decision = Some(decision);
        decision
    }

    /// Семплирование кольца: стратифицированные углы + jitter, случайный радиус
    pub fn sample_candidates(
        &self,
        origin: Vec3,
        threat_position: Vec3,
        role: &RoleParameters,
        agent: Entity,
        spatial: &impl SpatialQuery,
        rng: &mut impl Rng,
    ) -> Vec<ScoredCandidate> {
        let count = self.config.sample_count.max(1);
        let (ring_min, ring_max) = if self.config.ring_min <= self.config.ring_max {
            (self.config.ring_min, self.config.ring_max)
        } else {
            (self.config.ring_max, self.config.ring_min)
        };

        (0..count)
            .filter_map(|i| {
                let angle = (i as f32 + rng.gen::<f32>()) / count as f32 * TAU;
                let radius = rng.gen_range(ring_min..=ring_max);
                let raw = origin + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius;
                let point = spatial.project_to_walkable(raw)?;

                Some(ScoredCandidate {
                    point,
                    score: self.score_candidate(point, threat_position, role, agent, spatial),
                })
            })
            .collect()
    }

    pub fn score_candidate(
        &self,
        point: Vec3,
        threat_position: Vec3,
        role: &RoleParameters,
        agent: Entity,
        spatial: &impl SpatialQuery,
    ) -> f32 {
        let distance = horizontal_distance(point, threat_position);
        let distance_term = self.config.distance_weight / (1.0 + (distance - role.preferred_distance()).abs());

        let neighbours = spatial
            .entities_in_sphere(point, self.config.crowd_radius, layers::AGENTS)
            .iter()
            .filter(|hit| hit.root != agent)
            .count();
        let isolation_term = self.config.isolation_weight / (1.0 + neighbours as f32);

        let clear = spatial.line_of_sight(
            point + Vec3::Y * self.config.eye_height,
            threat_position + Vec3::Y * self.config.target_height,
        );
        let los_term = if clear { self.config.los_weight } else { 0.0 };

        distance_term + isolation_term + los_term
    }
}

/// Лучший кандидат со score > 0
pub fn best_candidate(candidates: &[ScoredCandidate]) -> Option<ScoredCandidate> {
    candidates
        .iter()
        .filter(|c| c.score > 0.0)
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .copied()
}

/// Yaw, при котором forward (−Z) смотрит вдоль `direction` (XZ)
pub fn yaw_towards(direction: Vec3) -> f32 {
    (-direction.x).atan2(-direction.z)
}

/// Плавный поворот вокруг Y не больше чем на `max_step` радиан
///
/// Возвращает оставшийся угол до цели.
pub fn turn_towards(transform: &mut Transform, point: Vec3, max_step: f32) -> f32 {
    let direction = Vec3::new(point.x - transform.translation.x, 0.0, point.z - transform.translation.z);
    if direction.length_squared() <= f32::EPSILON {
        return 0.0;
    }

    let (current, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
    let desired = yaw_towards(direction);
    let delta = wrap_angle(desired - current);
    let step = delta.clamp(-max_step.max(0.0), max_step.max(0.0));

    transform.rotation = Quat::from_rotation_y(current + step);
    (delta - step).abs()
}

/// Угол в [−π, π]
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped < -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}
