//! Сценарии боя без Bevy: director + HeadlessEngine
//!
//! Проверяем:
//! - Босс умирает ровно от 12 ударов и остаётся мёртвым
//! - Health инварианты (0 ≤ current ≤ max, не растёт)
//! - Не больше одного удара за тик
//! - Таймеры: countdown, lifetime снаряда
//! - Weighted выбор state только из таблицы

use bevy::math::Vec2;
use bossfight_simulation::ai::{presets, ActorDefinition, Behavior, NextState, StateDefinition, StateKind};
use bossfight_simulation::combat::{DamageProfile, ProjectileFate, ProjectileSpec};
use bossfight_simulation::encounter::EncounterSettings;
use bossfight_simulation::engine::Category;
use bossfight_simulation::{Countdown, EncounterDirector, EncounterEvent, HeadlessEngine, RandomStream};

const DT: f32 = 0.1;

fn director_with(extra: Vec<ActorDefinition>, seed: u64) -> EncounterDirector {
    let mut registry = presets::registry().expect("presets are valid");
    for definition in extra {
        registry.register(definition).expect("definition is valid");
    }
    EncounterDirector::new(registry, EncounterSettings::default(), seed).expect("director")
}

fn damage_events(events: &[EncounterEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EncounterEvent::DamageDealt { .. }))
        .count()
}

/// Манекен: 500 hp, 12 ударов до смерти, почти без неуязвимости
fn target_dummy() -> ActorDefinition {
    ActorDefinition::new("target_dummy", "target_dummy", 500.0, StateKind::Idle)
        .with_state(StateDefinition::new(StateKind::Idle))
        .with_state(StateDefinition::new(StateKind::Dead).lasting(1.0))
        .with_damage(DamageProfile::new(Category::Weapon, 500.0 / 12.0))
        .with_invulnerability(0.05)
}

/// 100 hp, удар оружием на 60
fn brute() -> ActorDefinition {
    ActorDefinition::new("brute", "brute", 100.0, StateKind::Idle)
        .with_state(StateDefinition::new(StateKind::Idle))
        .with_state(StateDefinition::new(StateKind::Dead).lasting(0.5))
        .with_damage(DamageProfile::new(Category::Weapon, 60.0))
        .with_invulnerability(0.5)
}

/// Стреляет один раз и замолкает
fn sniper(lifetime: f32) -> ActorDefinition {
    let bullet = ProjectileSpec {
        prefab: "sniper_bullet".to_string(),
        speed: 4.0,
        lifetime,
        damage: 10.0,
        sound: None,
    };
    ActorDefinition::new("sniper", "sniper", 20.0, StateKind::Shooting)
        .with_state(
            StateDefinition::new(StateKind::Shooting)
                .behavior(Behavior::Barrage {
                    projectile: bullet,
                    shots: 1,
                    interval: 10.0,
                    spread: 0.0,
                })
                .then(NextState::Fixed(StateKind::Idle)),
        )
        .with_state(StateDefinition::new(StateKind::Idle))
        .with_state(StateDefinition::new(StateKind::Dead))
}

#[test]
fn test_boss_dies_after_twelve_hits_and_stays_dead() {
    let mut engine = HeadlessEngine::new(42).with_prefabs(&presets::PREFABS);
    let mut director = director_with(Vec::new(), 42);
    let boss = director
        .spawn(&mut engine, presets::CLAP_BOSS, Vec2::new(0.0, 6.0))
        .expect("boss spawn");
    let handle = director.actor(boss).expect("boss").handle();
    let sword = engine.spawn_body(&[Category::Weapon], Vec2::new(1.0, 6.0));
    engine.add_overlap(handle, sword);

    let mut hits = 0;
    let mut previous = 500.0;
    let mut ticks = 0;
    while director.actor(boss).map_or(false, |actor| actor.is_alive()) {
        director.tick(&mut engine, DT);
        let events = director.drain_events();
        let landed = events
            .iter()
            .filter(|e| matches!(e, EncounterEvent::DamageDealt { victim, .. } if *victim == boss))
            .count();
        assert!(landed <= 1, "больше одного удара за тик");
        hits += landed;

        let health = director.actor(boss).expect("boss").health();
        assert!(health.current() >= 0.0 && health.current() <= health.max());
        assert!(health.current() <= previous, "health вырос");
        previous = health.current();

        ticks += 1;
        assert!(ticks < 100, "босс не умер за 100 тиков");
    }

    assert_eq!(hits, 12);
    assert_eq!(director.actor(boss).expect("boss").state(), StateKind::Dead);

    // Меч всё ещё касается: мёртвый босс не получает урон и не оживает
    let mut removed_after = 0;
    while let Some(actor) = director.actor(boss) {
        assert_eq!(actor.state(), StateKind::Dead);
        assert_eq!(actor.health().current(), 0.0);
        director.tick(&mut engine, DT);
        let events = director.drain_events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, EncounterEvent::DamageDealt { victim, .. } if *victim == boss)));
        removed_after += 1;
        assert!(removed_after <= 40, "мёртвый босс не удалён");
    }
    assert!(engine.destroyed().contains(&handle));
}

#[test]
fn test_target_dummy_takes_one_hit_per_tick() {
    let mut engine = HeadlessEngine::new(1);
    engine.register_prefab("target_dummy", vec![Category::Enemy]);
    let mut director = director_with(vec![target_dummy()], 1);
    let dummy = director
        .spawn(&mut engine, "target_dummy", Vec2::ZERO)
        .expect("dummy spawn");
    let handle = director.actor(dummy).expect("dummy").handle();

    // Три оружия сразу: за тик всё равно один удар
    for x in [-1.0, 1.0, 2.0] {
        let blade = engine.spawn_body(&[Category::Weapon], Vec2::new(x, 0.0));
        engine.add_overlap(handle, blade);
    }

    for tick in 1..=12 {
        director.tick(&mut engine, DT);
        let events = director.drain_events();
        assert_eq!(damage_events(&events), 1, "tick {}", tick);

        let actor = director.actor(dummy).expect("dummy");
        let health = actor.health();
        assert!(health.current() >= 0.0 && health.current() <= health.max());
        if tick < 12 {
            assert!(actor.is_alive(), "манекен умер раньше 12-го удара (tick {})", tick);
        }
    }

    let actor = director.actor(dummy).expect("dummy");
    assert!(!actor.is_alive());
    assert_eq!(actor.health().current(), 0.0);
    assert_eq!(actor.state(), StateKind::Dead);
    assert_eq!(director.deaths().len(), 1);
}

#[test]
fn test_simultaneous_hits_respect_invulnerability() {
    let mut engine = HeadlessEngine::new(2);
    engine.register_prefab("brute", vec![Category::Enemy]);
    let mut director = director_with(vec![brute()], 2);
    let brute = director.spawn(&mut engine, "brute", Vec2::ZERO).expect("brute spawn");
    let handle = director.actor(brute).expect("brute").handle();

    let sword = engine.spawn_body(&[Category::Weapon], Vec2::new(1.0, 0.0));
    let axe = engine.spawn_body(&[Category::Weapon], Vec2::new(-1.0, 0.0));
    engine.add_overlap(handle, sword);
    engine.add_overlap(handle, axe);

    director.tick(&mut engine, DT);

    let actor = director.actor(brute).expect("brute");
    assert_eq!(actor.health().current(), 40.0);
    assert!(actor.is_alive());
}

#[test]
fn test_countdown_expires_on_fourth_tick() {
    let mut countdown = Countdown::new(2.0);

    for _ in 0..3 {
        countdown.tick(0.5);
        assert!(countdown.is_running());
    }
    countdown.tick(0.5);
    assert!(countdown.expired());
    assert_eq!(countdown.remaining(), 0.0);
}

#[test]
fn test_projectile_expires_after_lifetime() {
    const FRAME: f32 = 1.0 / 60.0;

    let mut engine = HeadlessEngine::new(5);
    engine.register_prefab("sniper", vec![Category::Enemy]);
    engine.register_prefab("sniper_bullet", vec![Category::Projectile]);
    let mut director = director_with(vec![sniper(2.0)], 5);
    director.spawn(&mut engine, "sniper", Vec2::ZERO).expect("sniper spawn");

    let mut fired_at = None;
    let mut expired_at = None;
    for frame in 0..200 {
        director.tick(&mut engine, FRAME);
        engine.step(FRAME);

        for event in director.drain_events() {
            match event {
                EncounterEvent::ProjectileFired { .. } => fired_at = Some(frame),
                EncounterEvent::ProjectileDestroyed {
                    fate: ProjectileFate::Expired,
                    ..
                } => expired_at = Some(frame),
                _ => {}
            }
        }
        if expired_at.is_some() {
            break;
        }
    }

    let fired_at = fired_at.expect("снаряд не выпущен");
    let expired_at = expired_at.expect("снаряд не истёк");
    let lived = expired_at - fired_at;
    assert!((119..=120).contains(&lived), "lived {} frames", lived);
    assert!(director.projectiles().is_empty());
}

#[test]
fn test_actor_ids_are_never_reused() {
    let mut engine = HeadlessEngine::new(9).with_prefabs(&presets::PREFABS);
    let mut director = director_with(Vec::new(), 9);

    let mut seen = Vec::new();
    for round in 0..5 {
        let id = director
            .spawn(&mut engine, presets::GRUNT, Vec2::new(round as f32, 0.0))
            .expect("grunt spawn");
        assert!(!seen.contains(&id));
        seen.push(id);

        // Движок сам удаляет entity → актор уходит из roster
        let handle = director.actor(id).expect("grunt").handle();
        engine.remove_externally(handle);
        director.tick(&mut engine, DT);
        assert!(director.actor(id).is_none());
    }
}

#[test]
fn test_weighted_choice_only_picks_table_states() {
    let table = NextState::Weighted(vec![
        (StateKind::Smash, 3.0),
        (StateKind::Clap, 2.0),
        (StateKind::Shooting, 2.0),
        (StateKind::SummonEnemies, 1.0),
    ]);
    let allowed = [
        StateKind::Smash,
        StateKind::Clap,
        StateKind::Shooting,
        StateKind::SummonEnemies,
    ];

    let mut rng = RandomStream::new(77);
    let mut picked = Vec::new();
    for _ in 0..2000 {
        let state = table.choose(&mut rng).expect("weighted table is not empty");
        assert!(allowed.contains(&state), "{:?} не из таблицы", state);
        picked.push(state);
    }

    // Все варианты с положительным весом встречаются
    for state in allowed {
        assert!(picked.contains(&state), "{:?} ни разу не выбран", state);
    }
}
