//! Spatial query provider.
//!
//! AI никогда не ходит в физику напрямую: каждый тик собирается read-only
//! `SpatialSnapshot` (тела акторов + препятствия + walkable area), и все
//! запросы (sphere overlap, LOS, raycast, projection на пол) идут через
//! трейт `SpatialQuery`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Actor;

pub mod geometry;

#[cfg(test)]
mod spatial_tests;

/// Collision layers (битовая маска)
pub mod layers {
    /// AI агенты
    pub const AGENTS: u32 = 1 << 0;
    /// Игроки
    pub const PLAYERS: u32 = 1 << 1;
    /// Всё что может быть целью для vision
    pub const TARGETABLE: u32 = AGENTS | PLAYERS;
}

/// Максимальная глубина иерархии при поиске root entity
const MAX_HIERARCHY_DEPTH: usize = 32;

/// Тело (вертикальная капсула от точки на полу): участвует в spatial queries
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SpatialBody {
    pub radius: f32,
    pub height: f32,
    pub layers: u32,
}

impl Default for SpatialBody {
    fn default() -> Self {
        Self {
            radius: 0.4,
            height: 1.8,
            layers: layers::AGENTS,
        }
    }
}

/// Препятствие (AABB вокруг Transform.translation, rotation игнорируется)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Obstacle {
    pub half_extents: Vec3,
}

/// Walkable поверхность (прямоугольник на высоте ground_height)
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[reflect(Resource)]
pub struct WalkableArea {
    pub min: Vec2,
    pub max: Vec2,
    pub ground_height: f32,
}

impl WalkableArea {
    pub fn square(half_size: f32) -> Self {
        Self {
            min: Vec2::splat(-half_size),
            max: Vec2::splat(half_size),
            ground_height: 0.0,
        }
    }

    pub fn contains_xz(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.z >= self.min.y && point.z <= self.max.y
    }
}

/// Результат sphere overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    pub entity: Entity,
    /// Root иерархии (владелец коллайдера)
    pub root: Entity,
    /// Позиция на полу (base капсулы)
    pub position: Vec3,
    pub faction: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayHitKind {
    /// Геометрия уровня
    Obstacle(Entity),
    /// Тело актора
    Body { entity: Entity, root: Entity },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub kind: RayHitKind,
    pub distance: f32,
    pub point: Vec3,
}

impl RayHit {
    /// Root entity, если попали в тело
    pub fn body_root(&self) -> Option<Entity> {
        match self.kind {
            RayHitKind::Body { root, .. } => Some(root),
            RayHitKind::Obstacle(_) => None,
        }
    }
}

/// Контракт spatial query provider (мгновенные синхронные запросы внутри тика)
pub trait SpatialQuery {
    /// Тела в сфере, отфильтрованные по маске слоёв
    fn entities_in_sphere(&self, center: Vec3, radius: f32, layer_mask: u32) -> Vec<SpatialHit>;

    /// Свободна ли линия от `from` до `to` (только геометрия препятствий)
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;

    /// Ближайшее пересечение луча (препятствия + тела), тела с root == ignore_root пропускаются
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, ignore_root: Option<Entity>) -> Option<RayHit>;

    /// Проекция точки на walkable поверхность (None: под точкой нет пола)
    fn project_to_walkable(&self, point: Vec3) -> Option<Vec3>;

    /// Позиция тела по entity (или по root)
    fn body_position(&self, entity: Entity) -> Option<Vec3>;
}

#[derive(Debug, Clone, Copy)]
struct BodyEntry {
    entity: Entity,
    root: Entity,
    base: Vec3,
    radius: f32,
    height: f32,
    layers: u32,
    faction: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct ObstacleEntry {
    entity: Entity,
    min: Vec3,
    max: Vec3,
}

/// Read-only снимок мира на текущий тик
#[derive(Resource, Debug, Clone, Default)]
pub struct SpatialSnapshot {
    bodies: Vec<BodyEntry>,
    obstacles: Vec<ObstacleEntry>,
    walkable: Option<WalkableArea>,
}

impl SpatialSnapshot {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.obstacles.clear();
        self.walkable = None;
    }

    pub fn push_body(
        &mut self,
        entity: Entity,
        root: Entity,
        base: Vec3,
        body: SpatialBody,
        faction: Option<u64>,
    ) {
        self.bodies.push(BodyEntry {
            entity,
            root,
            base,
            radius: body.radius,
            height: body.height,
            layers: body.layers,
            faction,
        });
    }

    pub fn push_obstacle(&mut self, entity: Entity, center: Vec3, half_extents: Vec3) {
        self.obstacles.push(ObstacleEntry {
            entity,
            min: center - half_extents,
            max: center + half_extents,
        });
    }

    pub fn set_walkable(&mut self, walkable: Option<WalkableArea>) {
        self.walkable = walkable;
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Точка внутри препятствия (по XZ footprint)
    pub fn is_blocked_xz(&self, point: Vec3) -> bool {
        self.obstacles.iter().any(|o| {
            point.x >= o.min.x && point.x <= o.max.x && point.z >= o.min.z && point.z <= o.max.z
        })
    }
}

impl SpatialQuery for SpatialSnapshot {
    fn entities_in_sphere(&self, center: Vec3, radius: f32, layer_mask: u32) -> Vec<SpatialHit> {
        self.bodies
            .iter()
            .filter(|b| b.layers & layer_mask != 0)
            .filter(|b| geometry::point_capsule_distance(center, b.base, b.radius, b.height) <= radius)
            .map(|b| SpatialHit {
                entity: b.entity,
                root: b.root,
                position: b.base,
                faction: b.faction,
            })
            .collect()
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return true;
        }
        let direction = delta / length;

        !self.obstacles.iter().any(|o| {
            geometry::ray_aabb(from, direction, length, o.min, o.max).is_some()
        })
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, ignore_root: Option<Entity>) -> Option<RayHit> {
        let direction = direction.try_normalize()?;
        let mut best: Option<RayHit> = None;

        let mut consider = |kind: RayHitKind, distance: f32| {
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(RayHit {
                    kind,
                    distance,
                    point: origin + direction * distance,
                });
            }
        };

        for o in &self.obstacles {
            if let Some(distance) = geometry::ray_aabb(origin, direction, max_distance, o.min, o.max) {
                consider(RayHitKind::Obstacle(o.entity), distance);
            }
        }

        for b in &self.bodies {
            if ignore_root == Some(b.root) {
                continue;
            }
            if let Some(distance) = geometry::ray_capsule(origin, direction, max_distance, b.base, b.radius, b.height) {
                consider(
                    RayHitKind::Body {
                        entity: b.entity,
                        root: b.root,
                    },
                    distance,
                );
            }
        }

        best
    }

    fn project_to_walkable(&self, point: Vec3) -> Option<Vec3> {
        let walkable = self.walkable?;
        if !walkable.contains_xz(point) || self.is_blocked_xz(point) {
            return None;
        }
        Some(Vec3::new(point.x, walkable.ground_height, point.z))
    }

    fn body_position(&self, entity: Entity) -> Option<Vec3> {
        self.bodies
            .iter()
            .find(|b| b.entity == entity)
            .or_else(|| self.bodies.iter().find(|b| b.root == entity))
            .map(|b| b.base)
    }
}

/// Мировая позиция + root entity (поднимаемся по ChildOf, компонуя Transform)
fn resolve_world_position(
    entity: Entity,
    local: &Transform,
    parents: &Query<&ChildOf>,
    transforms: &Query<&Transform>,
) -> (Vec3, Entity) {
    let mut accumulated = *local;
    let mut current = entity;

    for _ in 0..MAX_HIERARCHY_DEPTH {
        let Ok(child_of) = parents.get(current) else {
            break;
        };
        let parent = child_of.parent();
        if let Ok(parent_transform) = transforms.get(parent) {
            accumulated = parent_transform.mul_transform(accumulated);
        }
        current = parent;
    }

    (accumulated.translation, current)
}

/// System: пересобрать SpatialSnapshot (первым делом в тике, после часов)
pub fn rebuild_spatial_snapshot(
    mut snapshot: ResMut<SpatialSnapshot>,
    bodies: Query<(Entity, &Transform, &SpatialBody)>,
    obstacles: Query<(Entity, &Transform, &Obstacle)>,
    actors: Query<&Actor>,
    parents: Query<&ChildOf>,
    transforms: Query<&Transform>,
    walkable: Option<Res<WalkableArea>>,
) {
    snapshot.clear();
    snapshot.set_walkable(walkable.map(|w| *w));

    for (entity, transform, body) in bodies.iter() {
        let (position, root) = resolve_world_position(entity, transform, &parents, &transforms);
        let faction = actors
            .get(root)
            .or_else(|_| actors.get(entity))
            .ok()
            .map(|a| a.faction_id);
        snapshot.push_body(entity, root, position, *body, faction);
    }

    for (entity, transform, obstacle) in obstacles.iter() {
        let (center, _) = resolve_world_position(entity, transform, &parents, &transforms);
        snapshot.push_obstacle(entity, center, obstacle.half_extents);
    }
}
