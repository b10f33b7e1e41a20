//! Tests for SpatialSnapshot queries.

use bevy::prelude::*;
use super::*;

fn snapshot_with_wall() -> SpatialSnapshot {
    let mut snapshot = SpatialSnapshot::default();
    snapshot.set_walkable(Some(WalkableArea::square(50.0)));
    // Стена на x = 5, высота 3м
    snapshot.push_obstacle(Entity::from_raw(100), Vec3::new(5.0, 1.5, 0.0), Vec3::new(0.5, 1.5, 2.0));
    snapshot
}

#[test]
fn test_line_of_sight_blocked_by_wall() {
    let snapshot = snapshot_with_wall();
    assert!(!snapshot.line_of_sight(Vec3::new(0.0, 1.6, 0.0), Vec3::new(10.0, 1.2, 0.0)));
    // В обход стены (по z)
    assert!(snapshot.line_of_sight(Vec3::new(0.0, 1.6, 5.0), Vec3::new(10.0, 1.2, 5.0)));
}

#[test]
fn test_raycast_returns_nearest_and_ignores_own_root() {
    let mut snapshot = SpatialSnapshot::default();
    let shooter = Entity::from_raw(1);
    let shooter_weapon = Entity::from_raw(2);
    let target = Entity::from_raw(3);

    snapshot.push_body(shooter, shooter, Vec3::ZERO, SpatialBody::default(), Some(1));
    // Коллайдер оружия: child стрелка, чуть впереди
    snapshot.push_body(shooter_weapon, shooter, Vec3::new(0.5, 0.0, 0.0), SpatialBody::default(), Some(1));
    snapshot.push_body(target, target, Vec3::new(8.0, 0.0, 0.0), SpatialBody::default(), Some(2));

    let hit = snapshot
        .raycast(Vec3::new(0.0, 1.2, 0.0), Vec3::X, 20.0, Some(shooter))
        .expect("target must be hit");
    assert_eq!(hit.body_root(), Some(target));

    // Без ignore_root первым будет собственное тело
    let self_hit = snapshot
        .raycast(Vec3::new(0.0, 1.2, 0.0), Vec3::X, 20.0, None)
        .expect("own body is hit");
    assert_eq!(self_hit.body_root(), Some(shooter));
}

#[test]
fn test_raycast_obstacle_before_body() {
    let mut snapshot = snapshot_with_wall();
    let target = Entity::from_raw(3);
    snapshot.push_body(target, target, Vec3::new(8.0, 0.0, 0.0), SpatialBody::default(), Some(2));

    let hit = snapshot
        .raycast(Vec3::new(0.0, 1.2, 0.0), Vec3::X, 20.0, None)
        .expect("wall must be hit");
    assert!(matches!(hit.kind, RayHitKind::Obstacle(_)));
    assert!((hit.distance - 4.5).abs() < 1e-4);
}

#[test]
fn test_entities_in_sphere_filters_layers_and_range() {
    let mut snapshot = SpatialSnapshot::default();
    let near = Entity::from_raw(1);
    let far = Entity::from_raw(2);
    let prop = Entity::from_raw(3);

    snapshot.push_body(near, near, Vec3::new(3.0, 0.0, 0.0), SpatialBody::default(), Some(2));
    snapshot.push_body(far, far, Vec3::new(30.0, 0.0, 0.0), SpatialBody::default(), Some(2));
    snapshot.push_body(
        prop,
        prop,
        Vec3::new(2.0, 0.0, 0.0),
        SpatialBody { layers: 1 << 5, ..default() },
        None,
    );

    let hits = snapshot.entities_in_sphere(Vec3::new(0.0, 1.0, 0.0), 10.0, layers::TARGETABLE);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, near);
    assert_eq!(hits[0].faction, Some(2));
}

#[test]
fn test_project_to_walkable() {
    let snapshot = snapshot_with_wall();

    let projected = snapshot.project_to_walkable(Vec3::new(1.0, 4.0, 1.0));
    assert_eq!(projected, Some(Vec3::new(1.0, 0.0, 1.0)));

    // Внутри стены
    assert_eq!(snapshot.project_to_walkable(Vec3::new(5.0, 0.0, 0.0)), None);
    // За пределами area
    assert_eq!(snapshot.project_to_walkable(Vec3::new(80.0, 0.0, 0.0)), None);

    // Без walkable area: пола нет нигде
    assert_eq!(SpatialSnapshot::default().project_to_walkable(Vec3::ZERO), None);
}

#[test]
fn test_rebuild_snapshot_resolves_hierarchy_root() {
    let mut world = World::new();
    world.init_resource::<SpatialSnapshot>();
    world.insert_resource(WalkableArea::square(20.0));

    let parent = world
        .spawn((
            Transform::from_xyz(4.0, 0.0, 0.0),
            SpatialBody::default(),
            Actor { faction_id: 7 },
        ))
        .id();
    let child = world
        .spawn((
            Transform::from_xyz(0.0, 0.0, 1.0),
            SpatialBody::default(),
            ChildOf(parent),
        ))
        .id();

    let mut schedule = bevy::ecs::schedule::Schedule::default();
    schedule.add_systems(rebuild_spatial_snapshot);
    schedule.run(&mut world);

    let snapshot = world.resource::<SpatialSnapshot>();
    assert_eq!(snapshot.body_count(), 2);
    assert_eq!(snapshot.body_position(child), Some(Vec3::new(4.0, 0.0, 1.0)));

    let hits = snapshot.entities_in_sphere(Vec3::new(4.0, 1.0, 1.0), 0.5, layers::AGENTS);
    let child_hit = hits.iter().find(|h| h.entity == child).expect("child in sphere");
    assert_eq!(child_hit.root, parent);
    assert_eq!(child_hit.faction, Some(7));
}
