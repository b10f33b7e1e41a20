//! AI Events: наблюдаемые снаружи изменения состояния агентов

use bevy::prelude::*;

use super::components::{AgentState, TransitionCause};

/// Переход FSM (пишется только при смене состояния)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StateTransition {
    pub entity: Entity,
    pub from: AgentState,
    pub to: AgentState,
    pub cause: TransitionCause,
    /// Время симуляции перехода
    pub at: f32,
}
