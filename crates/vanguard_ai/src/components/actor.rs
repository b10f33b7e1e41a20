//! Базовые компоненты акторов: Actor, Health + damage capability контракт.

use bevy::prelude::*;

/// Damage capability (внешний контракт health модели)
///
/// AI ядро не знает как устроено здоровье: только "можно нанести урон"
/// и "уже выведен из строя".
pub trait Damageable {
    fn take_damage(&mut self, amount: u32);
    fn is_incapacitated(&self) -> bool;
}

/// Актор (NPC, игрок): живое существо с фракцией
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health)]
pub struct Actor {
    /// Stable ID фракции (враг = другая фракция)
    pub faction_id: u64,
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }
}

impl Damageable for Health {
    fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    fn is_incapacitated(&self) -> bool {
        !self.is_alive()
    }
}
