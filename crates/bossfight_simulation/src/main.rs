//! Headless прогон encounter'а
//!
//! Без рендера: HeadlessEngine + скриптованный игрок с мечом.
//! Конфиг: первый аргумент (путь к .ron) или встроенный boss_arena.ron.
//!
//! ENV: BOSSFIGHT_SEED (default 42), BOSSFIGHT_TICKS (default 2 минуты при 60Hz)

use std::error::Error;
use std::str::FromStr;

use bevy::math::Vec2;
use bossfight_simulation::ai::{presets, Behavior};
use bossfight_simulation::encounter::log_event;
use bossfight_simulation::engine::{Category, TransformService};
use bossfight_simulation::{
    init_logger, log_info, set_log_level, Countdown, EncounterConfig, EncounterDirector, EntityHandle, HeadlessEngine,
    LogLevel, SIMULATION_HZ,
};

const DEFAULT_CONFIG: &str = include_str!("../assets/boss_arena.ron");

/// Скорость скриптованного игрока
const PLAYER_SPEED: f32 = 5.0;
/// Дистанция удара мечом
const SWORD_REACH: f32 = 10.0;
/// Пауза между ударами
const SWING_INTERVAL: f32 = 0.4;

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    set_log_level(LogLevel::Info);

    let seed: u64 = env_or("BOSSFIGHT_SEED", 42);
    let max_ticks: u64 = env_or("BOSSFIGHT_TICKS", 60 * 120);

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEFAULT_CONFIG.to_string(),
    };
    let config = EncounterConfig::from_ron_str(&source)?;

    log_info(&format!("🎮 Headless encounter `{}` (seed: {})", config.name, seed));

    let mut engine = HeadlessEngine::new(seed)
        .strict()
        .with_prefabs(&presets::PREFABS)
        .with_gravity(Vec2::new(0.0, -20.0), Some(0.0));
    register_config_prefabs(&mut engine, &config);

    // Без seed в конфиге encounter seed'ится от Random service движка
    let mut director = EncounterDirector::from_config_with_engine(&config, &mut engine)?;
    log_info(&format!("🎲 Encounter seed: {}", director.seed()));

    let player = engine.spawn_body(&[Category::Player], Vec2::new(0.0, 0.0));
    let sword = engine.spawn_body(&[Category::Weapon], Vec2::new(0.0, 0.0));
    director.set_player(Some(player));

    let dt = (1.0 / SIMULATION_HZ) as f32;
    let mut swing = Countdown::new(SWING_INTERVAL);
    let mut total_score: u64 = 0;

    for _ in 0..max_ticks {
        engine.clear_overlaps(sword);
        swing.tick(dt);

        if let Some((handle, target)) = nearest_enemy(&director, &engine, player) {
            let from = engine.position(player).unwrap_or(Vec2::ZERO);
            let step = (target.x - from.x).clamp(-PLAYER_SPEED * dt, PLAYER_SPEED * dt);
            let at = Vec2::new(from.x + step, from.y);
            engine.set_position(player, at);
            engine.set_position(sword, at);

            if swing.expired() && at.distance(target) <= SWORD_REACH {
                engine.add_overlap(sword, handle);
                swing.reset();
            }
        }

        director.tick(&mut engine, dt);
        for event in director.drain_events() {
            log_event(director.name(), &event);
        }
        engine.step(dt);

        if director.is_cleared() {
            break;
        }
    }

    for report in director.deaths() {
        total_score += u64::from(report.score);
    }

    println!("Encounter `{}` finished", director.name());
    println!("  ticks:            {}", director.ticks());
    println!("  elapsed:          {:.2}s", director.elapsed());
    println!("  cleared:          {}", director.is_cleared());
    println!("  deaths:           {}", director.deaths().len());
    println!("  score:            {}", total_score);
    println!("  dropped requests: {}", director.dropped_requests());
    println!("  effects:          {}", engine.effects().len());
    println!("  bursts over cap:  {}", director.effect_budget().dropped());

    Ok(())
}

/// Prefabs типов из конфига (актор → Enemy, снаряды Barrage → Projectile)
fn register_config_prefabs(engine: &mut HeadlessEngine, config: &EncounterConfig) {
    for definition in &config.actors {
        engine.register_prefab(&definition.prefab, vec![Category::Enemy]);
        for state in &definition.states {
            if let Behavior::Barrage { projectile, .. } = &state.behavior {
                engine.register_prefab(&projectile.prefab, vec![Category::Projectile]);
            }
        }
    }
}

/// Ближайший живой враг: (handle, позиция)
fn nearest_enemy(
    director: &EncounterDirector,
    engine: &HeadlessEngine,
    player: EntityHandle,
) -> Option<(EntityHandle, Vec2)> {
    let origin = engine.position(player)?;
    director
        .actors()
        .iter()
        .filter(|actor| actor.is_alive())
        .map(|actor| (actor.handle(), actor.position()))
        .min_by(|(_, a), (_, b)| origin.distance(*a).total_cmp(&origin.distance(*b)))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
