//! Headless skirmish Vanguard AI
//!
//! Два отряда на квадратной арене с укрытием в центре. Прогоняет
//! фиксированное число тиков и печатает JSON dump диагностики.

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;
use vanguard_ai::combat::MeleeWeapon;
use vanguard_ai::diagnostics::all_agent_reports;
use vanguard_ai::{
    create_simulation_app, log_error, log_info, run_ticks, spawn_agent, AgentConfig, Obstacle, RoleParameters,
    StateTransition, WalkableArea, WeaponCapability,
};

const SEED: u64 = 42;
const TICKS: u32 = 600;

fn squad_config(faction_id: u64) -> AgentConfig {
    AgentConfig {
        faction_id,
        ..Default::default()
    }
}

fn main() {
    let mut app = create_simulation_app(SEED, Some(WalkableArea::square(30.0)));
    log_info(&format!("🎮 Vanguard AI skirmish (seed: {}, ticks: {})", SEED, TICKS));

    // Укрытие между отрядами
    app.world_mut().spawn((
        Transform::from_xyz(0.0, 1.0, 0.0),
        Obstacle {
            half_extents: Vec3::new(3.0, 1.0, 0.5),
        },
    ));

    let mut marksman = squad_config(1);
    marksman.role = RoleParameters::marksman();
    marksman.patrol = vec![Vec3::new(-8.0, 0.0, 12.0), Vec3::new(8.0, 0.0, 12.0)];

    let rifleman = squad_config(1);

    let mut brawler = squad_config(2);
    brawler.role = RoleParameters::brawler();
    brawler.move_speed = 4.5;
    brawler.loadout.push(WeaponCapability::Melee(MeleeWeapon::default()));

    let mut sentry = squad_config(2);
    sentry.patrol = vec![Vec3::new(10.0, 0.0, -10.0), Vec3::new(-10.0, 0.0, -10.0)];

    let roster = [
        (&marksman, Vec3::new(-4.0, 0.0, 12.0)),
        (&rifleman, Vec3::new(4.0, 0.0, 10.0)),
        (&brawler, Vec3::new(-3.0, 0.0, -10.0)),
        (&sentry, Vec3::new(6.0, 0.0, -12.0)),
    ];

    for (config, position) in roster {
        if let Err(error) = config.validate() {
            log_error(&format!("invalid config for faction {}: {}", config.faction_id, error));
            return;
        }
        // Ошибка setup уже залогирована, агент остаётся с AiDisabled
        let _ = spawn_agent(app.world_mut(), config, position);
    }

    // Буферы событий живут два тика: читаем после каждого
    let mut transitions = EventCursor::<StateTransition>::default();
    for _ in 0..TICKS {
        run_ticks(&mut app, 1);

        let events = app.world().resource::<Events<StateTransition>>();
        for transition in transitions.read(events) {
            println!(
                "t={:.2}s {:?}: {:?} → {:?} ({:?})",
                transition.at, transition.entity, transition.from, transition.to, transition.cause
            );
        }
    }

    let reports = all_agent_reports(app.world_mut());
    match serde_json::to_string_pretty(&reports) {
        Ok(json) => println!("{}", json),
        Err(error) => log_error(&format!("failed to serialize diagnostics: {}", error)),
    }

    log_info("✅ Skirmish complete");
}
