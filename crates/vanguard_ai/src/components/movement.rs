//! Movement: контракт навигации + headless NavAgent.
//!
//! AI пишет только high-level команды (destination/stop/resume), сам
//! locomotion: в `advance_nav_agents` (или во внешнем движке).

use bevy::prelude::*;

use crate::ai::{turn_towards, AgentState, StateMachine};
use crate::spatial::SpatialSnapshot;
use crate::timeline::SimClock;

/// Дистанция, на которой путь считается пройденным
const PATH_COMPLETE_DISTANCE: f32 = 0.05;

/// Скорость поворота корпуса по ходу движения (град/с)
pub const DEFAULT_TURN_RATE_DEG: f32 = 270.0;

/// Navigation/Movement collaborator
pub trait Navigation {
    fn set_destination(&mut self, point: Vec3);
    /// Остановиться (путь сохраняется, `resume` продолжает)
    fn stop(&mut self);
    fn resume(&mut self);
    /// Сбросить путь полностью
    fn abort_path(&mut self);
    fn remaining_distance(&self) -> f32;
    fn current_speed(&self) -> f32;
    fn has_active_path(&self) -> bool;
    fn is_stopped(&self) -> bool;
}

/// Headless навигационный агент (прямолинейное движение к destination)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct NavAgent {
    /// Максимальная скорость (м/с)
    pub max_speed: f32,
    /// Текущая цель (None: пути нет)
    pub destination: Option<Vec3>,
    /// stop() без сброса пути
    pub stopped: bool,
    /// Измеренная скорость за последний тик (м/с)
    pub measured_speed: f32,
    /// Позиция агента на момент последнего sync
    pub position: Vec3,
    /// Поворот корпуса по ходу движения (град/с, 0: не поворачиваем)
    pub turn_rate_deg: f32,
}

impl Default for NavAgent {
    fn default() -> Self {
        Self::new(3.5)
    }
}

impl NavAgent {
    pub fn new(max_speed: f32) -> Self {
        Self {
            max_speed,
            destination: None,
            stopped: false,
            measured_speed: 0.0,
            position: Vec3::ZERO,
            turn_rate_deg: DEFAULT_TURN_RATE_DEG,
        }
    }

    pub fn with_turn_rate(mut self, turn_rate_deg: f32) -> Self {
        self.turn_rate_deg = turn_rate_deg;
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}

impl Navigation for NavAgent {
    fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.measured_speed = 0.0;
    }

    fn resume(&mut self) {
        self.stopped = false;
    }

    fn abort_path(&mut self) {
        self.destination = None;
        self.measured_speed = 0.0;
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map(|d| horizontal_distance(self.position, d))
            .unwrap_or(0.0)
    }

    fn current_speed(&self) -> f32 {
        self.measured_speed
    }

    fn has_active_path(&self) -> bool {
        self.destination.is_some()
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Дистанция по XZ (навигация плоская)
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

/// System: headless locomotion
///
/// Двигает агента к destination с max_speed. Если следующий шаг уходит за
/// walkable area или внутрь препятствия: стоим на месте (speed = 0),
/// stuck watchdog разберётся.
///
/// Вне боя корпус (и vision cone) поворачивается по ходу движения не быстрее
/// `turn_rate_deg`. В Combat facing ведёт positioning.
pub fn advance_nav_agents(
    mut agents: Query<(&mut NavAgent, &mut Transform, Option<&StateMachine>)>,
    snapshot: Res<SpatialSnapshot>,
    clock: Res<SimClock>,
) {
    use crate::spatial::SpatialQuery;

    let dt = clock.dt;

    for (mut agent, mut transform, fsm) in agents.iter_mut() {
        agent.position = transform.translation;

        let Some(destination) = agent.destination else {
            agent.measured_speed = 0.0;
            continue;
        };

        if agent.stopped {
            agent.measured_speed = 0.0;
            continue;
        }

        let remaining = horizontal_distance(agent.position, destination);
        if remaining <= PATH_COMPLETE_DISTANCE {
            agent.destination = None;
            agent.measured_speed = 0.0;
            continue;
        }

        let in_combat = fsm.is_some_and(|fsm| fsm.state() == AgentState::Combat);
        if !in_combat && agent.turn_rate_deg > 0.0 {
            turn_towards(&mut transform, destination, agent.turn_rate_deg.to_radians() * dt);
        }

        let to_goal = Vec3::new(destination.x - agent.position.x, 0.0, destination.z - agent.position.z) / remaining;
        let step = (agent.max_speed * dt).min(remaining);
        let next = agent.position + to_goal * step;

        if snapshot.project_to_walkable(next).is_none() {
            // Заблокированы: скорость 0, путь сохраняем
            agent.measured_speed = 0.0;
            continue;
        }

        transform.translation = next;
        agent.position = next;
        agent.measured_speed = if dt > 0.0 { step / dt } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_agent_contract() {
        let mut agent = NavAgent::new(2.0).at(Vec3::ZERO);
        assert!(!agent.has_active_path());
        assert_eq!(agent.remaining_distance(), 0.0);

        agent.set_destination(Vec3::new(3.0, 5.0, 4.0));
        assert!(agent.has_active_path());
        // Высота не учитывается
        assert_eq!(agent.remaining_distance(), 5.0);

        agent.stop();
        assert!(agent.is_stopped());
        assert!(agent.has_active_path());

        agent.resume();
        agent.abort_path();
        assert!(!agent.has_active_path());
        assert!(!agent.is_stopped());
    }
}
