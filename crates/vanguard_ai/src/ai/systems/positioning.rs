//! Combat positioning system.

use bevy::prelude::*;

use crate::ai::{
    AgentState, AiDisabled, Perception, PositioningDecision, RoleParameters, StateMachine, TacticalPositioning,
};
use crate::components::NavAgent;
use crate::spatial::SpatialSnapshot;
use crate::timeline::SimClock;
use crate::DeterministicRng;

/// Система: позиционирование агентов в Combat
pub fn update_combat_positioning(
    mut agents: Query<
        (
            Entity,
            &Perception,
            &StateMachine,
            &RoleParameters,
            &mut TacticalPositioning,
            &mut Transform,
            &mut NavAgent,
        ),
        Without<AiDisabled>,
    >,
    spatial: Res<SpatialSnapshot>,
    clock: Res<SimClock>,
    mut rng: ResMut<DeterministicRng>,
) {
    for (entity, perception, fsm, role, mut positioning, mut transform, mut nav) in agents.iter_mut() {
        if fsm.state() != AgentState::Combat {
            continue;
        }

        let snapshot = perception.snapshot(clock.now);
        let decision = positioning.update_combat_position(
            clock.now,
            clock.dt,
            snapshot.threat.as_ref(),
            role,
            entity,
            &mut transform,
            &mut *nav,
            &*spatial,
            &mut rng.rng,
        );

        match decision {
            PositioningDecision::Relocating { destination, score } => crate::log(&format!(
                "📍 {:?} relocating → {:?} (score {:.2}, {} candidates)",
                entity,
                destination,
                score,
                positioning.candidates_evaluated()
            )),
            PositioningDecision::NoCandidate { .. } => crate::log(&format!(
                "📍 {:?} no stand-point candidate, holding",
                entity
            )),
            PositioningDecision::Halted | PositioningDecision::Holding { .. } => {}
        }
    }
}
