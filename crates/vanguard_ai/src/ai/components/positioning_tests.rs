//! Tests for Tactical Positioning.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::perception::ThreatView;
use super::positioning::*;
use super::role::RoleParameters;
use crate::components::{horizontal_distance, NavAgent, Navigation};
use crate::spatial::{SpatialBody, SpatialSnapshot, WalkableArea};

const AGENT: Entity = Entity::from_raw(1);
const TARGET: Entity = Entity::from_raw(2);

fn threat_at(position: Vec3, visual_contact: bool) -> ThreatView {
    ThreatView {
        target: TARGET,
        last_seen: position,
        predicted: position,
        velocity: Vec3::ZERO,
        confidence: 0.9,
        visual_contact,
    }
}

fn arena() -> SpatialSnapshot {
    let mut snapshot = SpatialSnapshot::default();
    snapshot.set_walkable(Some(WalkableArea::square(50.0)));
    snapshot.push_body(AGENT, AGENT, Vec3::ZERO, SpatialBody::default(), Some(1));
    snapshot
}

#[test]
fn test_halts_without_visual_contact() {
    let mut positioning = TacticalPositioning::default();
    let mut nav = NavAgent::default();
    nav.set_destination(Vec3::new(3.0, 0.0, 0.0));
    let mut transform = Transform::default();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let role = RoleParameters::default();

    let lost = threat_at(Vec3::new(10.0, 0.0, 0.0), false);
    let decision = positioning.update_combat_position(
        0.0, 0.1, Some(&lost), &role, AGENT, &mut transform, &mut nav, &arena(), &mut rng,
    );
    assert_eq!(decision, PositioningDecision::Halted);
    assert!(nav.is_stopped());

    let decision = positioning.update_combat_position(
        0.0, 0.1, None, &role, AGENT, &mut transform, &mut nav, &arena(), &mut rng,
    );
    assert_eq!(decision, PositioningDecision::Halted);
}

#[test]
fn test_relocates_to_ring_candidate() {
    let mut positioning = TacticalPositioning::default();
    let mut nav = NavAgent::default();
    nav.stop();
    let mut transform = Transform::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let role = RoleParameters::default();
    let threat = threat_at(Vec3::new(10.0, 0.0, 0.0), true);

    let decision = positioning.update_combat_position(
        0.0, 0.1, Some(&threat), &role, AGENT, &mut transform, &mut nav, &arena(), &mut rng,
    );

    let PositioningDecision::Relocating { destination, score } = decision else {
        panic!("expected relocation, got {decision:?}");
    };
    let ring = horizontal_distance(Vec3::ZERO, destination);
    assert!((3.0..=8.0 + 1e-4).contains(&ring), "candidate off ring: {ring}");
    assert!(score > 0.0);
    assert_eq!(nav.destination, Some(destination));
    assert!(!nav.is_stopped());
    assert_eq!(positioning.stand_point(), Some(destination));
    assert_eq!(positioning.candidates_evaluated(), 12);
}

#[test]
fn test_no_walkable_candidates_holds_position() {
    let mut positioning = TacticalPositioning::default();
    let mut nav = NavAgent::default();
    let mut transform = Transform::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let threat = threat_at(Vec3::new(10.0, 0.0, 0.0), true);

    // Без walkable area проекция всегда None
    let spatial = SpatialSnapshot::default();
    let decision = positioning.update_combat_position(
        0.0,
        0.1,
        Some(&threat),
        &RoleParameters::default(),
        AGENT,
        &mut transform,
        &mut nav,
        &spatial,
        &mut rng,
    );

    assert!(matches!(decision, PositioningDecision::NoCandidate { .. }));
    assert!(!nav.has_active_path());
}

#[test]
fn test_en_route_suppresses_deviation_trigger() {
    let mut positioning = TacticalPositioning::default();
    let mut nav = NavAgent::default();
    let mut transform = Transform::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let role = RoleParameters::default();
    // 15 м при preferred 8: отклонение 7 > tolerance
    let threat = threat_at(Vec3::new(15.0, 0.0, 0.0), true);
    let spatial = arena();

    let first = positioning.update_combat_position(
        0.0, 0.1, Some(&threat), &role, AGENT, &mut transform, &mut nav, &spatial, &mut rng,
    );
    assert!(matches!(first, PositioningDecision::Relocating { .. }));

    // Ещё в пути, интервал не истёк
    assert!(!positioning.reposition_due(0.5, 15.0, &role, &nav));
    let second = positioning.update_combat_position(
        0.5, 0.1, Some(&threat), &role, AGENT, &mut transform, &mut nav, &spatial, &mut rng,
    );
    assert!(matches!(second, PositioningDecision::Holding { .. }));

    // Путь прерван: отклонение снова триггерит
    nav.abort_path();
    assert!(positioning.reposition_due(0.6, 15.0, &role, &nav));

    // Интервал истёк
    assert!(positioning.reposition_due(role.reposition_interval(), 8.0, &role, &nav));
}

#[test]
fn test_score_terms() {
    let positioning = TacticalPositioning::default();
    let role = RoleParameters::default();
    let threat = Vec3::new(8.0, 0.0, 0.0);

    // Ровно preferred distance, без соседей, LOS чист: 1 + 0.5 + 1
    let mut spatial = arena();
    let clean = positioning.score_candidate(Vec3::ZERO, threat, &role, AGENT, &spatial);
    assert!((clean - 2.5).abs() < 1e-5);

    // Сосед рядом с кандидатом
    spatial.push_body(Entity::from_raw(3), Entity::from_raw(3), Vec3::new(1.0, 0.0, 0.0), SpatialBody::default(), Some(1));
    let crowded = positioning.score_candidate(Vec3::ZERO, threat, &role, AGENT, &spatial);
    assert!((crowded - 2.25).abs() < 1e-5);

    // Стена между кандидатом и угрозой
    spatial.push_obstacle(Entity::from_raw(9), Vec3::new(4.0, 1.5, 0.0), Vec3::new(0.2, 2.0, 2.0));
    let blocked = positioning.score_candidate(Vec3::ZERO, threat, &role, AGENT, &spatial);
    assert!((blocked - 1.25).abs() < 1e-5);
}

#[test]
fn test_best_candidate_requires_positive_score() {
    assert_eq!(best_candidate(&[]), None);
    assert_eq!(
        best_candidate(&[ScoredCandidate { point: Vec3::X, score: 0.0 }]),
        None
    );

    let best = best_candidate(&[
        ScoredCandidate { point: Vec3::X, score: 1.0 },
        ScoredCandidate { point: Vec3::Z, score: 2.0 },
    ]);
    assert_eq!(best.map(|c| c.point), Some(Vec3::Z));
}

#[test]
fn test_turn_is_rate_limited() {
    let mut transform = Transform::default();
    // Цель за спиной (forward = −Z)
    let behind = Vec3::new(0.0, 0.0, 10.0);

    let remaining = turn_towards(&mut transform, behind, 0.5);
    assert!((remaining - (std::f32::consts::PI - 0.5)).abs() < 1e-4);

    for _ in 0..10 {
        turn_towards(&mut transform, behind, 0.5);
    }
    let forward = transform.rotation * Vec3::NEG_Z;
    assert!(forward.distance(Vec3::Z) < 1e-3);
}

#[test]
fn test_yaw_convention() {
    let mut transform = Transform::default();
    turn_towards(&mut transform, Vec3::new(5.0, 0.0, 0.0), 10.0);
    let forward = transform.rotation * Vec3::NEG_Z;
    assert!(forward.distance(Vec3::X) < 1e-4);
}

#[test]
fn test_faces_predicted_only_for_confident_moving_target() {
    let positioning = TacticalPositioning::default();
    let mut threat = threat_at(Vec3::new(10.0, 0.0, 0.0), true);
    threat.predicted = Vec3::new(11.0, 0.0, 0.0);

    // Стоит на месте
    assert_eq!(positioning.facing_point(&threat), threat.last_seen);

    threat.velocity = Vec3::new(2.0, 0.0, 0.0);
    assert_eq!(positioning.facing_point(&threat), threat.predicted);

    threat.confidence = 0.3;
    assert_eq!(positioning.facing_point(&threat), threat.last_seen);
}
