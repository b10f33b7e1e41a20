//! AI decision-making module
//!
//! Perception → Combat State Machine → Tactical Positioning.
//! Weapon engagement (последний шаг пайплайна): в `combat`.

use bevy::prelude::*;

pub mod components;
pub mod events;
pub mod systems;

// Re-export основных типов
pub use components::*;
pub use events::StateTransition;

use crate::SimulationSet;

/// AI Plugin
///
/// Регистрирует AI системы в FixedUpdate (SimulationSet::Ai).
/// Порядок выполнения:
/// 1. update_perception: sense + threat memory + alertness decay
/// 2. update_state_machines: state arbitration, transitions, stuck watchdog
/// 3. update_combat_positioning: hold / relocate для Combat агентов
pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StateTransition>();

        app.add_systems(
            FixedUpdate,
            (
                systems::update_perception,
                systems::update_state_machines,
                systems::update_combat_positioning,
            )
                .chain() // Последовательное выполнение для детерминизма
                .in_set(SimulationSet::Ai),
        );
    }
}
