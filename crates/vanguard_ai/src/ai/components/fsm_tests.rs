//! Tests for Combat State Machine.

use bevy::prelude::*;

use super::fsm::*;
use super::perception::{AlertTier, PerceptionSnapshot, ThreatView};
use crate::components::Navigation;

/// Навигация-заглушка: считает вызовы, скорость задаётся тестом
#[derive(Debug, Default)]
struct MockNav {
    position: Vec3,
    destination: Option<Vec3>,
    stopped: bool,
    speed: f32,
    stops: u32,
    resumes: u32,
    aborts: u32,
    destinations: Vec<Vec3>,
}

impl Navigation for MockNav {
    fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
        self.destinations.push(point);
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.stops += 1;
    }

    fn resume(&mut self) {
        self.stopped = false;
        self.resumes += 1;
    }

    fn abort_path(&mut self) {
        self.destination = None;
        self.aborts += 1;
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map(|d| self.position.distance(d))
            .unwrap_or(0.0)
    }

    fn current_speed(&self) -> f32 {
        self.speed
    }

    fn has_active_path(&self) -> bool {
        self.destination.is_some()
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

fn threat(visual_contact: bool, confidence: f32) -> PerceptionSnapshot {
    PerceptionSnapshot {
        has_threat: true,
        threat: Some(ThreatView {
            target: Entity::from_raw(7),
            last_seen: Vec3::new(10.0, 0.0, 0.0),
            predicted: Vec3::new(10.0, 0.0, 0.0),
            velocity: Vec3::ZERO,
            confidence,
            visual_contact,
        }),
        alertness: 0.8,
        tier: AlertTier::Combat,
    }
}

fn alert_only(tier: AlertTier) -> PerceptionSnapshot {
    PerceptionSnapshot {
        tier,
        alertness: match tier {
            AlertTier::Relaxed => 0.1,
            AlertTier::Alert => 0.5,
            AlertTier::Combat => 0.9,
        },
        ..PerceptionSnapshot::calm()
    }
}

fn route() -> PatrolRoute {
    PatrolRoute::new(vec![
        Vec3::new(5.0, 0.0, 0.0),
        Vec3::new(5.0, 0.0, 5.0),
        Vec3::new(0.0, 0.0, 5.0),
    ])
}

#[test]
fn test_decide_state_rule() {
    assert_eq!(decide_state(&threat(true, 0.1), false), AgentState::Combat);
    assert_eq!(decide_state(&threat(false, 0.5), false), AgentState::Investigate);
    assert_eq!(decide_state(&threat(false, 0.3), false), AgentState::Search);
    assert_eq!(decide_state(&alert_only(AlertTier::Alert), true), AgentState::Investigate);
    assert_eq!(decide_state(&alert_only(AlertTier::Relaxed), true), AgentState::Patrol);
    assert_eq!(decide_state(&alert_only(AlertTier::Relaxed), false), AgentState::Idle);
}

#[test]
fn test_combat_tier_from_noise_alone_does_not_fight() {
    assert_eq!(decide_state(&alert_only(AlertTier::Combat), false), AgentState::Idle);
    assert_eq!(decide_state(&alert_only(AlertTier::Combat), true), AgentState::Patrol);
}

#[test]
fn test_no_double_entry() {
    let mut fsm = StateMachine::default();
    let mut nav = MockNav::default();
    let snapshot = threat(true, 0.9);

    let first = fsm.update(&snapshot, &mut nav, 0.1);
    assert_eq!(
        first,
        vec![Transition {
            from: AgentState::Idle,
            to: AgentState::Combat,
            cause: TransitionCause::Perception,
        }]
    );
    assert_eq!(nav.stops, 1);

    for _ in 0..10 {
        assert!(fsm.update(&snapshot, &mut nav, 0.1).is_empty());
    }
    assert_eq!(fsm.transition_count(), 1);
    assert_eq!(nav.stops, 1);
}

#[test]
fn test_leaving_combat_resumes_navigation() {
    let mut fsm = StateMachine::default();
    let mut nav = MockNav::default();

    fsm.update(&threat(true, 0.9), &mut nav, 0.1);
    let transitions = fsm.update(&threat(false, 0.8), &mut nav, 0.1);

    assert_eq!(transitions[0].to, AgentState::Investigate);
    assert!(!nav.stopped);
    assert_eq!(nav.destination, Some(Vec3::new(10.0, 0.0, 0.0)));
    assert_eq!(fsm.investigate_target(), Some(Vec3::new(10.0, 0.0, 0.0)));
}

#[test]
fn test_alert_investigate_holds_position() {
    let mut fsm = StateMachine::new(StateMachineConfig::default(), route());
    let mut nav = MockNav::default();

    fsm.update(&alert_only(AlertTier::Relaxed), &mut nav, 0.1);
    assert_eq!(fsm.state(), AgentState::Patrol);

    fsm.update(&alert_only(AlertTier::Alert), &mut nav, 0.1);
    assert_eq!(fsm.state(), AgentState::Investigate);
    assert!(nav.stopped);
    assert_eq!(fsm.investigate_target(), None);
}

#[test]
fn test_patrol_cycles_waypoints_on_arrival() {
    let mut fsm = StateMachine::new(StateMachineConfig::default(), route());
    let mut nav = MockNav::default();
    let calm = PerceptionSnapshot::calm();

    fsm.update(&calm, &mut nav, 0.1);
    assert_eq!(nav.destination, Some(Vec3::new(5.0, 0.0, 0.0)));

    // В пределах arrival_tolerance
    nav.position = Vec3::new(4.5, 0.0, 0.0);
    nav.speed = 1.0;
    fsm.update(&calm, &mut nav, 0.1);
    assert_eq!(fsm.patrol().cursor(), 1);
    assert_eq!(nav.destination, Some(Vec3::new(5.0, 0.0, 5.0)));

    // Полный круг
    nav.position = Vec3::new(5.0, 0.0, 5.0);
    fsm.update(&calm, &mut nav, 0.1);
    nav.position = Vec3::new(0.0, 0.0, 5.0);
    fsm.update(&calm, &mut nav, 0.1);
    assert_eq!(fsm.patrol().cursor(), 0);
}

#[test]
fn test_investigate_retargets_when_last_seen_moves() {
    let mut fsm = StateMachine::default();
    let mut nav = MockNav::default();

    let mut snapshot = threat(false, 0.8);
    fsm.update(&snapshot, &mut nav, 0.1);
    assert_eq!(nav.destinations.len(), 1);

    // Мелкое смещение: путь не трогаем
    if let Some(t) = snapshot.threat.as_mut() {
        t.last_seen = Vec3::new(10.3, 0.0, 0.0);
    }
    fsm.update(&snapshot, &mut nav, 0.1);
    assert_eq!(nav.destinations.len(), 1);

    if let Some(t) = snapshot.threat.as_mut() {
        t.last_seen = Vec3::new(14.0, 0.0, 0.0);
    }
    fsm.update(&snapshot, &mut nav, 0.1);
    assert_eq!(nav.destinations.last(), Some(&Vec3::new(14.0, 0.0, 0.0)));
}

#[test]
fn test_watchdog_fires_after_timeout_strictly_exceeded() {
    let config = StateMachineConfig {
        stuck_timeout: 1.0,
        ..Default::default()
    };
    let mut fsm = StateMachine::new(config, route());
    let mut nav = MockNav::default();
    let calm = PerceptionSnapshot::calm();

    // Tick 1: вход в Patrol, путь к (5,0,0), скорость 0
    let dt = 0.25;
    let first = fsm.update(&calm, &mut nav, dt);
    assert_eq!(first.len(), 1);
    assert!((fsm.stuck_timer() - 0.25).abs() < 1e-6);

    // Ticks 2..4: таймер 0.5, 0.75, 1.0: ещё не > timeout
    for _ in 0..3 {
        let fired = fsm.update(&calm, &mut nav, dt);
        assert!(fired.is_empty());
    }
    assert_eq!(fsm.stuck_timer(), 1.0);
    assert_eq!(nav.aborts, 0);

    // Tick 5: 1.25 > 1.0 → abort + Idle
    let fired = fsm.update(&calm, &mut nav, dt);
    assert_eq!(
        fired,
        vec![Transition {
            from: AgentState::Patrol,
            to: AgentState::Idle,
            cause: TransitionCause::Stuck,
        }]
    );
    assert_eq!(nav.aborts, 1);
    assert!(nav.stopped);
    assert_eq!(fsm.state(), AgentState::Idle);
    assert_eq!(fsm.stuck_timer(), 0.0);
    assert_eq!(fsm.patrol().cursor(), 1);

    // Следующий тик: снова Patrol, уже к следующему waypoint
    fsm.update(&calm, &mut nav, dt);
    assert_eq!(fsm.state(), AgentState::Patrol);
    assert_eq!(nav.destination, Some(Vec3::new(5.0, 0.0, 5.0)));
}

#[test]
fn test_watchdog_resets_when_moving() {
    let config = StateMachineConfig {
        stuck_timeout: 1.0,
        ..Default::default()
    };
    let mut fsm = StateMachine::new(config, route());
    let mut nav = MockNav::default();
    let calm = PerceptionSnapshot::calm();

    fsm.update(&calm, &mut nav, 0.25);
    fsm.update(&calm, &mut nav, 0.25);
    assert!(fsm.stuck_timer() > 0.0);

    nav.speed = 2.0;
    fsm.update(&calm, &mut nav, 0.25);
    assert_eq!(fsm.stuck_timer(), 0.0);
}

#[test]
fn test_watchdog_exact_at_sixty_hz() {
    // 120 × (1/60) в f32 даёт 1.9999988: срабатывание не должно зависеть от этого
    let mut fsm = StateMachine::new(StateMachineConfig::default(), route());
    let mut nav = MockNav::default();
    let calm = PerceptionSnapshot::calm();
    let dt = 1.0 / 60.0;

    for tick in 1..=120 {
        let fired = fsm.update(&calm, &mut nav, dt);
        assert!(
            fired.iter().all(|t| t.cause != TransitionCause::Stuck),
            "fired early on tick {}",
            tick
        );
    }
    assert_eq!(nav.aborts, 0);

    let fired = fsm.update(&calm, &mut nav, dt);
    assert_eq!(fired.last().map(|t| t.cause), Some(TransitionCause::Stuck));
    assert_eq!(nav.aborts, 1);
}

#[test]
fn test_ticks_in_rounds_up() {
    assert_eq!(ticks_in(1.0, 0.25), 4);
    assert_eq!(ticks_in(2.0, 1.0 / 60.0), 120);
    assert_eq!(ticks_in(0.1, 1.0 / 60.0), 6);
    assert_eq!(ticks_in(0.3, 0.25), 2);
    assert_eq!(ticks_in(0.0, 0.25), 0);
    assert_eq!(ticks_in(1.0, 0.0), u32::MAX);
}

#[test]
fn test_patrol_route_without_waypoints() {
    let mut route = PatrolRoute::default();
    assert!(!route.is_configured());
    route.advance();
    assert_eq!(route.current(), None);
    assert_eq!(route.cursor(), 0);
}
