//! Vanguard AI Core
//!
//! ECS-ядро боевого AI агента на Bevy 0.16:
//! Perception → Combat State Machine → Tactical Positioning → Weapon Engagement.
//!
//! Коллабораторы (навигация, spatial queries, health модель): узкие трейты
//! с headless реализациями, поэтому весь пайплайн гоняется в тестах без движка.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod diagnostics;
pub mod logger;
pub mod sound;
pub mod spatial;
pub mod spawn;
pub mod timeline;

// Re-export базовых типов для удобства
pub use ai::{AIPlugin, AgentState, Perception, RoleParameters, StateMachine, StateTransition, TacticalPositioning};
pub use combat::{CombatPlugin, DamageDealt, WeaponCapability, WeaponEngagement};
pub use components::*;
pub use config::{AgentConfig, ConfigError};
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use sound::{SoundEvent, SoundPropagation};
pub use spatial::{Obstacle, SpatialBody, SpatialSnapshot, WalkableArea};
pub use spawn::{spawn_agent, spawn_target, AgentSetupError};
pub use timeline::SimClock;

/// Частота симуляционного тика
pub const TICK_HZ: f32 = 60.0;

/// Фазы одного тика (выполняются строго последовательно)
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// SimClock += dt
    Clock,
    /// Пересборка SpatialSnapshot
    Spatial,
    /// Perception → FSM → Positioning
    Ai,
    /// Weapon engagement + damage
    Combat,
    /// Доставка звуков этого тика
    Sound,
    /// Headless навигация
    Locomotion,
    /// Отключение incapacitated агентов
    Cleanup,
}

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Seed мог задать create_headless_app: не перетираем
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(TICK_HZ as f64))
            .insert_resource(SimClock::new(TICK_HZ))
            .init_resource::<spatial::SpatialSnapshot>()
            // Сервис звука: явный ресурс, не глобальный singleton
            .init_resource::<SoundPropagation>();

        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::Clock,
                SimulationSet::Spatial,
                SimulationSet::Ai,
                SimulationSet::Combat,
                SimulationSet::Sound,
                SimulationSet::Locomotion,
                SimulationSet::Cleanup,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                timeline::tick_sim_clock.in_set(SimulationSet::Clock),
                spatial::rebuild_spatial_snapshot.in_set(SimulationSet::Spatial),
                sound::propagate_sounds.in_set(SimulationSet::Sound),
                components::advance_nav_agents.in_set(SimulationSet::Locomotion),
            ),
        );

        // Подсистемы
        app.add_plugins((AIPlugin, CombatPlugin));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
///
/// SimulationPlugin не добавляется: вызывающий решает сам.
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(TICK_HZ as f64)); // 60Hz FixedUpdate

    app
}

/// Headless app + SimulationPlugin + walkable area
pub fn create_simulation_app(seed: u64, walkable: Option<WalkableArea>) -> App {
    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);
    if let Some(walkable) = walkable {
        app.insert_resource(walkable);
    }
    app
}

/// Прогнать ровно `ticks` симуляционных тиков (FixedUpdate напрямую)
///
/// После каждого тика буферы событий симуляции переключаются, как это делает
/// `First` в полном `app.update()`: событие живёт два тика, потом удаляется.
/// Внешний читатель должен держать свой `EventCursor` и читать каждый тик.
pub fn run_ticks(app: &mut App, ticks: u32) {
    for _ in 0..ticks {
        let world = app.world_mut();
        world.run_schedule(FixedUpdate);
        swap_event_buffers::<StateTransition>(world);
        swap_event_buffers::<DamageDealt>(world);
    }
}

fn swap_event_buffers<T: Event>(world: &mut World) {
    if let Some(mut events) = world.get_resource_mut::<Events<T>>() {
        events.update();
    }
}
