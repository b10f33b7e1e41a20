//! Introspection: сериализуемые отчёты компонентов агента.
//!
//! Отчёты строятся только через публичные accessors компонентов.

use bevy::prelude::*;
use serde::Serialize;

use crate::ai::{AgentState, AiDisabled, AlertTier, Perception, PositioningDecision, StateMachine, TacticalPositioning};
use crate::combat::{WeaponCapability, WeaponEngagement};
use crate::components::Health;
use crate::timeline::SimClock;

/// Компонент умеет описать себя для диагностики
pub trait Introspect {
    type Report: Serialize;

    fn report(&self, now: f32) -> Self::Report;
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatSummary {
    pub target: u64,
    pub last_seen: Vec3,
    pub confidence: f32,
    pub visual_contact: bool,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerceptionReport {
    pub alertness: f32,
    pub tier: AlertTier,
    pub has_threat: bool,
    pub primary: Option<u64>,
    pub threats: Vec<ThreatSummary>,
}

impl Introspect for Perception {
    type Report = PerceptionReport;

    fn report(&self, now: f32) -> PerceptionReport {
        PerceptionReport {
            alertness: self.alertness(),
            tier: self.alert_tier(),
            has_threat: self.has_threat(now),
            primary: self.primary_target().map(|e| e.to_bits()),
            threats: self
                .records()
                .iter()
                .map(|r| ThreatSummary {
                    target: r.target.to_bits(),
                    last_seen: r.last_seen,
                    confidence: self.confidence_now(r, now),
                    visual_contact: r.visual_contact,
                    velocity: r.velocity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateMachineReport {
    pub state: AgentState,
    pub time_in_state: f32,
    pub transitions: u32,
    pub stuck_timer: f32,
    pub patrol_cursor: Option<usize>,
}

impl Introspect for StateMachine {
    type Report = StateMachineReport;

    fn report(&self, _now: f32) -> StateMachineReport {
        StateMachineReport {
            state: self.state(),
            time_in_state: self.time_in_state(),
            transitions: self.transition_count(),
            stuck_timer: self.stuck_timer(),
            patrol_cursor: self.patrol().is_configured().then(|| self.patrol().cursor()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositioningReport {
    pub stand_point: Option<Vec3>,
    pub last_reposition_at: Option<f32>,
    pub last_decision: Option<PositioningDecision>,
    pub candidates_evaluated: usize,
}

impl Introspect for TacticalPositioning {
    type Report = PositioningReport;

    fn report(&self, _now: f32) -> PositioningReport {
        PositioningReport {
            stand_point: self.stand_point(),
            last_reposition_at: self.last_reposition_at(),
            last_decision: self.last_decision(),
            candidates_evaluated: self.candidates_evaluated(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaponReport {
    pub kind: &'static str,
    pub ready: bool,
    pub ready_at: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementReport {
    pub weapons: Vec<WeaponReport>,
    pub shots_fired: u32,
    pub shots_blocked: u32,
    pub hits: u32,
    pub melee_swings: u32,
}

impl Introspect for WeaponEngagement {
    type Report = EngagementReport;

    fn report(&self, now: f32) -> EngagementReport {
        EngagementReport {
            weapons: self
                .loadout()
                .iter()
                .map(|w| match w {
                    WeaponCapability::Ranged(r) => WeaponReport {
                        kind: "ranged",
                        ready: r.is_ready(now),
                        ready_at: r.ready_at(),
                    },
                    WeaponCapability::Melee(m) => WeaponReport {
                        kind: "melee",
                        ready: m.is_ready(now),
                        ready_at: m.ready_at(),
                    },
                })
                .collect(),
            shots_fired: self.shots_fired(),
            shots_blocked: self.shots_blocked(),
            hits: self.hits(),
            melee_swings: self.melee_swings(),
        }
    }
}

/// Сводный отчёт по агенту
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub entity: u64,
    pub time: f32,
    pub health: Option<u32>,
    pub disabled: Option<String>,
    pub perception: Option<PerceptionReport>,
    pub state_machine: Option<StateMachineReport>,
    pub positioning: Option<PositioningReport>,
    pub engagement: Option<EngagementReport>,
}

/// Отчёт по entity (None: entity не существует)
pub fn agent_report(world: &World, entity: Entity) -> Option<AgentReport> {
    let entity_ref = world.get_entity(entity).ok()?;
    let now = world.get_resource::<SimClock>().map(|c| c.now).unwrap_or(0.0);

    Some(AgentReport {
        entity: entity.to_bits(),
        time: now,
        health: entity_ref.get::<Health>().map(|h| h.current),
        disabled: entity_ref.get::<AiDisabled>().map(|d| d.reason.clone()),
        perception: entity_ref.get::<Perception>().map(|c| c.report(now)),
        state_machine: entity_ref.get::<StateMachine>().map(|c| c.report(now)),
        positioning: entity_ref.get::<TacticalPositioning>().map(|c| c.report(now)),
        engagement: entity_ref.get::<WeaponEngagement>().map(|c| c.report(now)),
    })
}

/// Отчёты по всем агентам (упорядочены по entity index для стабильного дампа)
pub fn all_agent_reports(world: &mut World) -> Vec<AgentReport> {
    let mut query = world.query_filtered::<Entity, With<StateMachine>>();
    let mut entities: Vec<Entity> = query.iter(world).collect();
    entities.sort_by_key(|e| e.index());

    entities
        .into_iter()
        .filter_map(|e| agent_report(world, e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ThreatRecord;

    #[test]
    fn test_perception_report_serializes() {
        let mut perception = Perception::default();
        perception.remember(ThreatRecord::new(Entity::from_raw(3), Vec3::new(1.0, 0.0, 2.0), 0.8, 0.0));
        perception.update_threats(0.0, Vec3::ZERO, |_| true);

        let report = perception.report(1.0);
        assert_eq!(report.threats.len(), 1);
        assert!((report.threats[0].confidence - 0.6).abs() < 1e-5);

        let json = serde_json::to_value(&report).expect("serializable");
        assert_eq!(json["tier"], "Relaxed");
        assert_eq!(json["has_threat"], true);
    }

    #[test]
    fn test_agent_report_for_missing_entity() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        world.despawn(entity);
        assert!(agent_report(&world, entity).is_none());
    }
}
