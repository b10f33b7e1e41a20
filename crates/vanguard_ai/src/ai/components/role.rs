//! Role Parameters (неизменяемы после спавна).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Параметры роли агента (sniper / assault / brawler: разные пресеты)
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[reflect(Component)]
#[serde(default)]
pub struct RoleParameters {
    /// Предпочитаемая дистанция до цели (метры)
    preferred_distance: f32,
    /// Минимальный интервал между сменами позиции (секунды)
    reposition_interval: f32,
}

impl Default for RoleParameters {
    fn default() -> Self {
        Self {
            preferred_distance: 8.0,
            reposition_interval: 3.0,
        }
    }
}

impl RoleParameters {
    pub fn new(preferred_distance: f32, reposition_interval: f32) -> Self {
        Self {
            preferred_distance,
            reposition_interval,
        }
    }

    /// Пресет: дальний бой
    pub fn marksman() -> Self {
        Self::new(18.0, 5.0)
    }

    /// Пресет: ближний бой
    pub fn brawler() -> Self {
        Self::new(1.5, 1.0)
    }

    pub fn preferred_distance(&self) -> f32 {
        self.preferred_distance
    }

    pub fn reposition_interval(&self) -> f32 {
        self.reposition_interval
    }
}
