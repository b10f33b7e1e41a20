//! FSM system: state arbitration + stuck watchdog.

use bevy::prelude::*;

use crate::ai::{AiDisabled, Perception, StateMachine, StateTransition, TransitionCause};
use crate::components::NavAgent;
use crate::timeline::SimClock;

/// Система: FSM transitions
///
/// Читает только PerceptionSnapshot. Переходы → StateTransition events.
pub fn update_state_machines(
    mut agents: Query<(Entity, &Perception, &mut StateMachine, &mut NavAgent), Without<AiDisabled>>,
    mut transitions: EventWriter<StateTransition>,
    clock: Res<SimClock>,
) {
    for (entity, perception, mut fsm, mut nav) in agents.iter_mut() {
        let snapshot = perception.snapshot(clock.now);

        for transition in fsm.update(&snapshot, &mut *nav, clock.dt) {
            match transition.cause {
                TransitionCause::Perception => crate::log(&format!(
                    "🔀 {:?} {:?} → {:?} (alertness {:.2}, threat: {})",
                    entity, transition.from, transition.to, snapshot.alertness, snapshot.has_threat
                )),
                TransitionCause::Stuck => crate::log_warning(&format!(
                    "🧱 {:?} stuck in {:?} → path aborted, forced {:?}",
                    entity, transition.from, transition.to
                )),
            }

            transitions.write(StateTransition {
                entity,
                from: transition.from,
                to: transition.to,
                cause: transition.cause,
                at: clock.now,
            });
        }
    }
}
