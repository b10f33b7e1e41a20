//! Combat State Machine (state arbitration + stuck watchdog).
//!
//! Состояние каждый тик заново выводится из `PerceptionSnapshot`
//! (`decide_state`). Переходы срабатывают только при смене состояния:
//! on_exit(old) → on_enter(new). Combat тело делегировано системам
//! positioning + weapon engagement.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::perception::{AlertTier, PerceptionSnapshot};
use crate::components::{horizontal_distance, Navigation};

/// Confidence, выше которого потерянная из виду угроза ещё расследуется
pub const INVESTIGATE_CONFIDENCE: f32 = 0.3;

/// AI состояния
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum AgentState {
    /// Стоим на месте
    #[default]
    Idle,
    /// Обход waypoints по кругу
    Patrol,
    /// Движение к последней известной позиции (или удержание позиции по тревоге)
    Investigate,
    /// Бой (visual contact с primary угрозой)
    Combat,
    /// Угроза есть, но confidence низкий (без поведения)
    Search,
}

/// Почему произошёл переход
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum TransitionCause {
    /// Выведено из perception snapshot
    Perception,
    /// Принудительно: stuck watchdog
    Stuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AgentState,
    pub to: AgentState,
    pub cause: TransitionCause,
}

/// Параметры FSM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Дистанция, на которой waypoint считается достигнутым
    pub arrival_tolerance: f32,
    /// Ниже этой скорости агент считается стоящим (м/с)
    pub stuck_speed_threshold: f32,
    /// Сколько можно стоять с активным путём до abort (секунды)
    pub stuck_timeout: f32,
    /// Investigate: смещение last_seen, после которого путь перестраивается
    pub investigate_retarget_distance: f32,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            arrival_tolerance: 0.75,
            stuck_speed_threshold: 0.1,
            stuck_timeout: 2.0,
            investigate_retarget_distance: 0.5,
        }
    }
}

/// Маршрут патруля (курсор: incidental state)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Reflect)]
pub struct PatrolRoute {
    waypoints: Vec<Vec3>,
    #[serde(skip)]
    cursor: usize,
}

impl PatrolRoute {
    pub fn new(waypoints: Vec<Vec3>) -> Self {
        Self { waypoints, cursor: 0 }
    }

    pub fn is_configured(&self) -> bool {
        !self.waypoints.is_empty()
    }

    pub fn current(&self) -> Option<Vec3> {
        self.waypoints.get(self.cursor).copied()
    }

    /// Следующий waypoint (по кругу)
    pub fn advance(&mut self) {
        if !self.waypoints.is_empty() {
            self.cursor = (self.cursor + 1) % self.waypoints.len();
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }
}

/// Правило выбора состояния (чистая функция snapshot → state)
pub fn decide_state(snapshot: &PerceptionSnapshot, patrol_configured: bool) -> AgentState {
    if snapshot.has_threat {
        if let Some(threat) = snapshot.threat {
            return if threat.visual_contact {
                AgentState::Combat
            } else if threat.confidence > INVESTIGATE_CONFIDENCE {
                AgentState::Investigate
            } else {
                AgentState::Search
            };
        }
    }

    // Combat tier без угрозы (только звук/урон) остаётся в Idle/Patrol
    if snapshot.tier == AlertTier::Alert {
        AgentState::Investigate
    } else if patrol_configured {
        AgentState::Patrol
    } else {
        AgentState::Idle
    }
}

/// State machine component
#[derive(Component, Debug, Clone)]
pub struct StateMachine {
    config: StateMachineConfig,
    state: AgentState,
    patrol: PatrolRoute,
    stuck_timer: f32,
    /// Подряд идущие тики без движения
    stuck_ticks: u32,
    /// Точка, к которой идёт Investigate (None: удерживаем позицию)
    investigate_target: Option<Vec3>,
    time_in_state: f32,
    transitions: u32,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(StateMachineConfig::default(), PatrolRoute::default())
    }
}

impl StateMachine {
    pub fn new(config: StateMachineConfig, patrol: PatrolRoute) -> Self {
        Self {
            config,
            state: AgentState::Idle,
            patrol,
            stuck_timer: 0.0,
            stuck_ticks: 0,
            investigate_target: None,
            time_in_state: 0.0,
            transitions: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    pub fn patrol(&self) -> &PatrolRoute {
        &self.patrol
    }

    pub fn stuck_timer(&self) -> f32 {
        self.stuck_timer
    }

    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    /// Сколько переходов произошло за жизнь агента
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }

    pub fn investigate_target(&self) -> Option<Vec3> {
        self.investigate_target
    }

    /// Полный тик FSM: decide → transition → tick body → watchdog
    ///
    /// Возвращает переходы этого тика (0, 1 или 2 если watchdog сработал).
    pub fn update(
        &mut self,
        snapshot: &PerceptionSnapshot,
        nav: &mut impl Navigation,
        dt: f32,
    ) -> Vec<Transition> {
        let mut fired = Vec::new();
        self.time_in_state += dt;

        let desired = decide_state(snapshot, self.patrol.is_configured());
        if let Some(t) = self.transition_to(desired, TransitionCause::Perception, snapshot, nav) {
            fired.push(t);
        }

        self.tick_state(snapshot, nav);

        if let Some(t) = self.watchdog(snapshot, nav, dt) {
            fired.push(t);
        }

        fired
    }

    /// Переход только при смене состояния
    pub fn transition_to(
        &mut self,
        next: AgentState,
        cause: TransitionCause,
        snapshot: &PerceptionSnapshot,
        nav: &mut impl Navigation,
    ) -> Option<Transition> {
        if next == self.state {
            return None;
        }

        let from = self.state;
        self.on_exit(from, nav);
        self.state = next;
        self.time_in_state = 0.0;
        self.transitions += 1;
        self.on_enter(next, snapshot, nav);

        Some(Transition { from, to: next, cause })
    }

    fn on_exit(&mut self, state: AgentState, nav: &mut impl Navigation) {
        match state {
            AgentState::Combat => nav.resume(),
            AgentState::Investigate => self.investigate_target = None,
            AgentState::Idle | AgentState::Patrol | AgentState::Search => {}
        }
    }

    fn on_enter(&mut self, state: AgentState, snapshot: &PerceptionSnapshot, nav: &mut impl Navigation) {
        match state {
            AgentState::Idle => nav.stop(),
            AgentState::Patrol => {
                nav.resume();
                if let Some(point) = self.patrol.current() {
                    nav.set_destination(point);
                }
            }
            AgentState::Investigate => match snapshot.threat {
                Some(threat) if snapshot.has_threat => {
                    nav.resume();
                    nav.set_destination(threat.last_seen);
                    self.investigate_target = Some(threat.last_seen);
                }
                // Тревога без угрозы: держим позицию
                _ => {
                    nav.stop();
                    self.investigate_target = None;
                }
            },
            // Positioning возобновит движение в этом же тике, если нужно
            AgentState::Combat => nav.stop(),
            AgentState::Search => {}
        }
    }

    fn tick_state(&mut self, snapshot: &PerceptionSnapshot, nav: &mut impl Navigation) {
        match self.state {
            AgentState::Idle => nav.stop(),
            AgentState::Patrol => {
                let arrived = !nav.has_active_path() || nav.remaining_distance() <= self.config.arrival_tolerance;
                if arrived {
                    self.patrol.advance();
                    if let Some(point) = self.patrol.current() {
                        nav.set_destination(point);
                    }
                }
            }
            AgentState::Investigate => {
                let Some(threat) = snapshot.threat.filter(|_| snapshot.has_threat) else {
                    return;
                };
                let moved = self
                    .investigate_target
                    .is_none_or(|t| horizontal_distance(t, threat.last_seen) > self.config.investigate_retarget_distance);
                if moved {
                    nav.resume();
                    nav.set_destination(threat.last_seen);
                    self.investigate_target = Some(threat.last_seen);
                }
            }
            AgentState::Combat | AgentState::Search => {}
        }
    }

    /// Stuck watchdog (независимо от состояния)
    fn watchdog(
        &mut self,
        snapshot: &PerceptionSnapshot,
        nav: &mut impl Navigation,
        dt: f32,
    ) -> Option<Transition> {
        let stalled = !nav.is_stopped()
            && nav.has_active_path()
            && nav.remaining_distance() > self.config.arrival_tolerance
            && nav.current_speed() < self.config.stuck_speed_threshold;

        if !stalled {
            self.stuck_timer = 0.0;
            self.stuck_ticks = 0;
            return None;
        }

        // Решение по числу тиков: сумма f32 dt плавает вокруг timeout
        self.stuck_ticks += 1;
        self.stuck_timer += dt;
        if self.stuck_ticks <= ticks_in(self.config.stuck_timeout, dt) {
            return None;
        }

        self.stuck_timer = 0.0;
        self.stuck_ticks = 0;
        nav.abort_path();
        // Недостижимый waypoint пропускаем
        self.patrol.advance();

        self.transition_to(AgentState::Idle, TransitionCause::Stuck, snapshot, nav)
    }
}

/// Сколько тиков длины `dt` укладывается в `duration` (с округлением вверх)
pub fn ticks_in(duration: f32, dt: f32) -> u32 {
    if dt <= 0.0 {
        return u32::MAX;
    }
    ((duration / dt) - 1e-4).ceil().max(0.0) as u32
}

/// AI отключён (ошибка setup или агент incapacitated)
///
/// Все AI системы фильтруют `Without<AiDisabled>`.
#[derive(Component, Debug, Clone, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct AiDisabled {
    pub reason: String,
}
