//! Perception: threat memory + alertness.
//!
//! Зрение (cone + LOS) создаёт/обновляет ThreatRecord. Слух и урон только
//! поднимают alertness: записей не создают (атакующий находится следующими
//! сканами зрения).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::spatial::{layers, SpatialQuery};

/// Параметры восприятия (задаются при спавне агента)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Дальность зрения (метры)
    pub vision_range: f32,
    /// Полный угол конуса зрения (градусы)
    pub vision_angle_deg: f32,
    /// Высота глаз над base позицией
    pub eye_height: f32,
    /// Высота точки на цели для LOS луча (грудь)
    pub chest_height: f32,
    /// Дальность слуха (метры)
    pub hearing_range: f32,
    /// Период сканирования зрения (секунды)
    pub sense_interval: f32,
    /// Прирост confidence за одно обнаружение
    pub detection_gain: f32,
    /// Скорость затухания confidence (единиц в секунду)
    pub decay_rate: f32,
    /// Ниже этого confidence запись забывается
    pub forget_epsilon: f32,
    /// Минимальный confidence, с которым угроза пригодна для решений
    pub min_usable_confidence: f32,
    /// Boost alertness за визуальное обнаружение
    pub visual_alert_boost: f32,
    /// Boost alertness за полученный урон
    pub damage_alert_boost: f32,
    /// Множитель boost от звука
    pub sound_alert_scale: f32,
    /// Пассивное затухание alertness (единиц в секунду)
    pub alert_decay_rate: f32,
    /// Множитель composite score за визуальный контакт
    pub visual_bonus: f32,
    /// Нижняя граница proximity factor (дальние угрозы не обнуляются)
    pub proximity_floor: f32,
    /// Горизонт предсказания позиции (секунды)
    pub prediction_lookahead: f32,
    /// Velocity оценивается только если предыдущее наблюдение не старше (секунды)
    pub velocity_window: f32,
    /// Маска слоёв потенциальных целей
    pub target_layers: u32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            vision_range: 25.0,
            vision_angle_deg: 120.0,
            eye_height: 1.6,
            chest_height: 1.2,
            hearing_range: 30.0,
            sense_interval: 0.1,
            detection_gain: 0.5,
            decay_rate: 0.2,
            forget_epsilon: 0.01,
            min_usable_confidence: 0.05,
            visual_alert_boost: 0.5,
            damage_alert_boost: 0.6,
            sound_alert_scale: 1.0,
            alert_decay_rate: 0.05,
            visual_bonus: 1.5,
            proximity_floor: 0.05,
            prediction_lookahead: 0.5,
            velocity_window: 1.0,
            target_layers: layers::TARGETABLE,
        }
    }
}

/// Грубый уровень тревоги (производный от alertness)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum AlertTier {
    Relaxed,
    Alert,
    Combat,
}

impl AlertTier {
    pub const ALERT_THRESHOLD: f32 = 0.4;
    pub const COMBAT_THRESHOLD: f32 = 0.7;

    pub fn from_alertness(alertness: f32) -> Self {
        if alertness >= Self::COMBAT_THRESHOLD {
            AlertTier::Combat
        } else if alertness >= Self::ALERT_THRESHOLD {
            AlertTier::Alert
        } else {
            AlertTier::Relaxed
        }
    }
}

/// `max(0, confidence − decay_rate × elapsed)`
pub fn decayed_confidence(confidence: f32, decay_rate: f32, elapsed: f32) -> f32 {
    (confidence - decay_rate * elapsed.max(0.0)).max(0.0)
}

/// Запись памяти об одной цели
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct ThreatRecord {
    /// Handle цели (не владеем)
    pub target: Entity,
    pub last_seen: Vec3,
    /// Confidence на момент last_update
    pub confidence: f32,
    pub last_update: f32,
    pub visual_contact: bool,
    /// Оценка скорости (конечная разность между наблюдениями)
    pub velocity: Vec3,
    /// last_seen + velocity × lookahead
    pub predicted: Vec3,
}

impl ThreatRecord {
    pub fn new(target: Entity, position: Vec3, confidence: f32, now: f32) -> Self {
        Self {
            target,
            last_seen: position,
            confidence: confidence.clamp(0.0, 1.0),
            last_update: now,
            visual_contact: true,
            velocity: Vec3::ZERO,
            predicted: position,
        }
    }

    pub fn confidence_at(&self, now: f32, decay_rate: f32) -> f32 {
        decayed_confidence(self.confidence, decay_rate, now - self.last_update)
    }
}

/// Поза наблюдателя для sense()
#[derive(Debug, Clone, Copy)]
pub struct ObserverPose {
    /// Base позиция (на полу)
    pub position: Vec3,
    /// Направление взгляда
    pub forward: Vec3,
    /// Root entity наблюдателя (сам себя не видит)
    pub root: Entity,
    pub faction: Option<u64>,
}

/// Read-only вид угрозы для downstream (FSM, positioning, weapons)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatView {
    pub target: Entity,
    pub last_seen: Vec3,
    pub predicted: Vec3,
    pub velocity: Vec3,
    /// Confidence на момент snapshot
    pub confidence: f32,
    pub visual_contact: bool,
}

/// Снимок восприятия на тик: единственный вход FSM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionSnapshot {
    pub has_threat: bool,
    pub threat: Option<ThreatView>,
    pub alertness: f32,
    pub tier: AlertTier,
}

impl PerceptionSnapshot {
    /// Пустой снимок (ничего не знаем, спокойны)
    pub fn calm() -> Self {
        Self {
            has_threat: false,
            threat: None,
            alertness: 0.0,
            tier: AlertTier::Relaxed,
        }
    }
}

/// Perception component (per agent)
#[derive(Component, Debug, Clone)]
pub struct Perception {
    config: PerceptionConfig,
    records: Vec<ThreatRecord>,
    primary: Option<Entity>,
    alertness: f32,
    next_sense_at: f32,
    /// Время последнего update_threats (для has_threat/current_threat)
    evaluated_at: f32,
}

impl Default for Perception {
    fn default() -> Self {
        Self::new(PerceptionConfig::default())
    }
}

impl Perception {
    pub fn new(config: PerceptionConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            primary: None,
            alertness: 0.0,
            next_sense_at: 0.0,
            evaluated_at: 0.0,
        }
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    pub fn alertness(&self) -> f32 {
        self.alertness
    }

    pub fn alert_tier(&self) -> AlertTier {
        AlertTier::from_alertness(self.alertness)
    }

    pub fn records(&self) -> &[ThreatRecord] {
        &self.records
    }

    pub fn record(&self, target: Entity) -> Option<&ThreatRecord> {
        self.records.iter().find(|r| r.target == target)
    }

    fn boost_alertness(&mut self, amount: f32) -> f32 {
        let before = self.alertness;
        self.alertness = (self.alertness + amount.max(0.0)).min(1.0);
        self.alertness - before
    }

    /// Засеять память записью извне (scripted encounter, restore)
    pub fn remember(&mut self, record: ThreatRecord) {
        self.records.retain(|r| r.target != record.target);
        self.records.push(record);
    }

    /// Визуальное сканирование (cone + LOS до груди цели)
    ///
    /// Возвращает количество целей, увиденных в этом проходе.
    pub fn sense(&mut self, now: f32, pose: &ObserverPose, spatial: &impl SpatialQuery) -> usize {
        self.next_sense_at = now + self.config.sense_interval;

        let eye = pose.position + Vec3::Y * self.config.eye_height;
        let forward = pose.forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        let half_angle = (self.config.vision_angle_deg * 0.5).to_radians();

        let mut seen: Vec<Entity> = Vec::new();

        for hit in spatial.entities_in_sphere(eye, self.config.vision_range, self.config.target_layers) {
            if hit.root == pose.root || seen.contains(&hit.root) {
                continue;
            }

            // Союзники: не угроза
            if pose.faction.is_some() && hit.faction == pose.faction {
                continue;
            }

            let chest = hit.position + Vec3::Y * self.config.chest_height;
            let to_target = chest - eye;
            let distance = to_target.length();
            if distance > self.config.vision_range {
                continue;
            }

            if distance > f32::EPSILON && forward.angle_between(to_target) > half_angle {
                continue;
            }

            if !spatial.line_of_sight(eye, chest) {
                continue;
            }

            seen.push(hit.root);
            self.refresh(hit.root, hit.position, now);
            self.boost_alertness(self.config.visual_alert_boost);
        }

        for record in self.records.iter_mut() {
            if !seen.contains(&record.target) {
                record.visual_contact = false;
            }
        }

        seen.len()
    }

    /// Создать/обновить запись после визуального обнаружения
    fn refresh(&mut self, target: Entity, position: Vec3, now: f32) {
        let gain = self.config.detection_gain;
        let decay_rate = self.config.decay_rate;
        let lookahead = self.config.prediction_lookahead;
        let window = self.config.velocity_window;

        let Some(record) = self.records.iter_mut().find(|r| r.target == target) else {
            self.records.push(ThreatRecord::new(target, position, gain, now));
            return;
        };

        let current = record.confidence_at(now, decay_rate);
        let elapsed = now - record.last_update;

        record.velocity = if elapsed > 1e-4 && elapsed <= window {
            (position - record.last_seen) / elapsed
        } else if elapsed > window {
            Vec3::ZERO
        } else {
            record.velocity
        };

        record.confidence = (current + gain).min(1.0);
        record.last_seen = position;
        record.last_update = now;
        record.visual_contact = true;
        record.predicted = position + record.velocity * lookahead;
    }

    /// Слух: boost = intensity × (1 − d / hearing_range). Записей не создаёт.
    pub fn receive_sound(&mut self, listener_position: Vec3, origin: Vec3, intensity: f32) -> f32 {
        let distance = listener_position.distance(origin);
        if distance > self.config.hearing_range || self.config.hearing_range <= 0.0 {
            return 0.0;
        }

        let falloff = 1.0 - distance / self.config.hearing_range;
        self.boost_alertness(intensity.clamp(0.0, 1.0) * falloff * self.config.sound_alert_scale)
    }

    /// Полученный урон: резкий boost alertness, атакующий не атрибутируется
    pub fn receive_damage_report(&mut self, origin: Vec3, damage: u32) -> f32 {
        let boost = self.boost_alertness(self.config.damage_alert_boost);
        crate::log(&format!(
            "💢 damage report: {} from {:?} → alertness {:.2}",
            damage, origin, self.alertness
        ));
        boost
    }

    /// Затухание записей + выбор primary
    ///
    /// Невалидные цели (despawn / incapacitated) удаляются сразу.
    /// Возвращает количество удалённых записей.
    pub fn update_threats(&mut self, now: f32, observer: Vec3, is_valid: impl Fn(Entity) -> bool) -> usize {
        self.evaluated_at = now;
        let decay_rate = self.config.decay_rate;
        let epsilon = self.config.forget_epsilon;

        let before = self.records.len();
        self.records
            .retain(|r| is_valid(r.target) && r.confidence_at(now, decay_rate) >= epsilon);
        let removed = before - self.records.len();

        self.primary = self
            .records
            .iter()
            .map(|r| (self.composite_score(r, now, observer), r))
            .max_by(|(score_a, a), (score_b, b)| {
                score_a
                    .total_cmp(score_b)
                    .then_with(|| {
                        a.confidence_at(now, decay_rate)
                            .total_cmp(&b.confidence_at(now, decay_rate))
                    })
                    .then_with(|| a.last_update.total_cmp(&b.last_update))
            })
            .map(|(_, r)| r.target);

        removed
    }

    /// confidence × proximity × visual bonus
    pub fn composite_score(&self, record: &ThreatRecord, now: f32, observer: Vec3) -> f32 {
        let confidence = record.confidence_at(now, self.config.decay_rate);
        let distance = observer.distance(record.last_seen);
        let proximity = if self.config.vision_range > 0.0 {
            (1.0 - distance / self.config.vision_range).clamp(self.config.proximity_floor, 1.0)
        } else {
            self.config.proximity_floor
        };
        let bonus = if record.visual_contact {
            self.config.visual_bonus
        } else {
            1.0
        };

        confidence * proximity * bonus
    }

    /// Пассивное затухание: только пока нет primary
    pub fn decay_alertness(&mut self, dt: f32) {
        if self.primary.is_some() {
            return;
        }
        self.alertness = (self.alertness - self.config.alert_decay_rate * dt.max(0.0)).max(0.0);
    }

    /// Полный тик восприятия: sense (по интервалу) → update_threats → decay
    pub fn tick(
        &mut self,
        now: f32,
        dt: f32,
        pose: &ObserverPose,
        spatial: &impl SpatialQuery,
        is_valid: impl Fn(Entity) -> bool,
    ) {
        if now >= self.next_sense_at {
            self.sense(now, pose, spatial);
        }
        self.update_threats(now, pose.position, is_valid);
        self.decay_alertness(dt);
    }

    pub fn current_threat(&self) -> Option<&ThreatRecord> {
        self.primary.and_then(|target| self.record(target))
    }

    pub fn confidence_now(&self, record: &ThreatRecord, now: f32) -> f32 {
        record.confidence_at(now, self.config.decay_rate)
    }

    /// Есть primary с confidence выше порога пригодности
    pub fn has_threat(&self, now: f32) -> bool {
        self.current_threat()
            .is_some_and(|r| self.confidence_now(r, now) > self.config.min_usable_confidence)
    }

    pub fn snapshot(&self, now: f32) -> PerceptionSnapshot {
        let threat = self.current_threat().map(|r| ThreatView {
            target: r.target,
            last_seen: r.last_seen,
            predicted: r.predicted,
            velocity: r.velocity,
            confidence: self.confidence_now(r, now),
            visual_contact: r.visual_contact,
        });

        PerceptionSnapshot {
            has_threat: self.has_threat(now),
            threat,
            alertness: self.alertness,
            tier: self.alert_tier(),
        }
    }

    /// Время последней оценки угроз
    pub fn evaluated_at(&self) -> f32 {
        self.evaluated_at
    }

    pub fn primary_target(&self) -> Option<Entity> {
        self.primary
    }
}
