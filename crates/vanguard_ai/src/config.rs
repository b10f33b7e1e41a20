//! Конфигурация агента (serde + валидация).
//!
//! Все секции имеют `Default`, поэтому JSON может задавать только то,
//! что отличается от дефолтов:
//!
//! ```json
//! { "faction_id": 2, "role": { "preferred_distance": 15.0 }, "perception": { "vision_range": 40.0 } }
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::{PerceptionConfig, PositioningConfig, RoleParameters, StateMachineConfig};
use crate::combat::{RangedWeapon, WeaponCapability};
use crate::components::DEFAULT_TURN_RATE_DEG;

/// Ошибки загрузки конфигурации
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse agent config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Полная конфигурация одного агента
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub faction_id: u64,
    pub max_health: u32,
    /// Скорость навигации (м/с)
    pub move_speed: f32,
    /// Поворот корпуса по ходу движения вне боя (град/с)
    pub turn_rate_deg: f32,
    pub perception: PerceptionConfig,
    pub state_machine: StateMachineConfig,
    pub positioning: PositioningConfig,
    pub role: RoleParameters,
    /// Waypoints патруля (пусто: агент стоит в Idle)
    pub patrol: Vec<Vec3>,
    pub loadout: Vec<WeaponCapability>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            faction_id: 1,
            max_health: 100,
            move_speed: 3.5,
            turn_rate_deg: DEFAULT_TURN_RATE_DEG,
            perception: PerceptionConfig::default(),
            state_machine: StateMachineConfig::default(),
            positioning: PositioningConfig::default(),
            role: RoleParameters::default(),
            patrol: Vec::new(),
            loadout: vec![WeaponCapability::Ranged(RangedWeapon::default())],
        }
    }
}

fn ensure(condition: bool, field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        })
    }
}

impl AgentConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Проверка диапазонов (всё, что сломало бы математику тика)
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.max_health > 0, "max_health", "must be positive")?;
        ensure(self.move_speed > 0.0, "move_speed", "must be positive")?;
        ensure(self.turn_rate_deg >= 0.0, "turn_rate_deg", "must be non-negative")?;

        let p = &self.perception;
        ensure(p.vision_range > 0.0, "perception.vision_range", "must be positive")?;
        ensure(
            p.vision_angle_deg > 0.0 && p.vision_angle_deg <= 360.0,
            "perception.vision_angle_deg",
            format!("{} not in (0, 360]", p.vision_angle_deg),
        )?;
        ensure(p.hearing_range >= 0.0, "perception.hearing_range", "must be non-negative")?;
        ensure(p.sense_interval >= 0.0, "perception.sense_interval", "must be non-negative")?;
        ensure(
            p.detection_gain > 0.0 && p.detection_gain <= 1.0,
            "perception.detection_gain",
            format!("{} not in (0, 1]", p.detection_gain),
        )?;
        ensure(p.decay_rate >= 0.0, "perception.decay_rate", "must be non-negative")?;
        ensure(p.alert_decay_rate >= 0.0, "perception.alert_decay_rate", "must be non-negative")?;
        ensure(p.forget_epsilon >= 0.0, "perception.forget_epsilon", "must be non-negative")?;

        let fsm = &self.state_machine;
        ensure(fsm.stuck_timeout > 0.0, "state_machine.stuck_timeout", "must be positive")?;
        ensure(fsm.arrival_tolerance >= 0.0, "state_machine.arrival_tolerance", "must be non-negative")?;

        let pos = &self.positioning;
        ensure(pos.sample_count > 0, "positioning.sample_count", "must be positive")?;
        ensure(
            pos.ring_min >= 0.0 && pos.ring_min <= pos.ring_max,
            "positioning.ring_min",
            format!("ring [{}, {}] is empty", pos.ring_min, pos.ring_max),
        )?;
        ensure(pos.turn_rate_deg > 0.0, "positioning.turn_rate_deg", "must be positive")?;

        ensure(self.role.preferred_distance() > 0.0, "role.preferred_distance", "must be positive")?;
        ensure(self.role.reposition_interval() >= 0.0, "role.reposition_interval", "must be non-negative")?;

        for weapon in &self.loadout {
            match weapon {
                WeaponCapability::Ranged(r) => {
                    ensure(r.fire_interval > 0.0, "loadout.ranged.fire_interval", "must be positive")?;
                    ensure(r.range > 0.0, "loadout.ranged.range", "must be positive")?;
                    ensure(r.max_lead >= 0.0, "loadout.ranged.max_lead", "must be non-negative")?;
                }
                WeaponCapability::Melee(m) => {
                    ensure(m.cooldown >= 0.0, "loadout.melee.cooldown", "must be non-negative")?;
                    ensure(m.hit_delay >= 0.0, "loadout.melee.hit_delay", "must be non-negative")?;
                    ensure(m.range > 0.0, "loadout.melee.range", "must be positive")?;
                }
            }
        }

        Ok(())
    }
}
