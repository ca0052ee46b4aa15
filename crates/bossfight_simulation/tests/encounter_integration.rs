//! Encounter integration test (Bevy App)
//!
//! Headless App: EncounterPlugin тикает director в FixedUpdate,
//! события уходят в Events<EncounterEvent>.
//!
//! Проверяем:
//! - Босс под постоянным ударом меча умирает и удаляется
//! - EncounterEvent доходят до Bevy систем
//! - Нет паники/крашей

use bevy::prelude::*;
use bossfight_simulation::ai::presets;
use bossfight_simulation::encounter::{tick_encounters, DeathCause};
use bossfight_simulation::engine::Category;
use bossfight_simulation::*;

/// Все события encounter'ов, увиденные Bevy системой
#[derive(Resource, Default)]
struct SeenEvents(Vec<EncounterEvent>);

fn collect_events(mut reader: EventReader<EncounterEvent>, mut seen: ResMut<SeenEvents>) {
    seen.0.extend(reader.read().cloned());
}

/// App с одним боссом, которого меч касается каждый тик
fn create_boss_app(seed: u64) -> (App, ActorId) {
    let mut app = create_headless_app(seed);

    let mut engine = HeadlessEngine::new(seed).with_prefabs(&presets::PREFABS);
    let registry = presets::registry().expect("presets are valid");
    let mut director = EncounterDirector::new(registry, EncounterSettings::default(), seed).expect("director");

    let boss = director
        .spawn(&mut engine, presets::CLAP_BOSS, Vec2::new(0.0, 6.0))
        .expect("boss spawn");
    let handle = director.actor(boss).expect("boss in roster").handle();
    let sword = engine.spawn_body(&[Category::Weapon], Vec2::new(1.0, 6.0));
    engine.add_overlap(handle, sword);

    app.insert_resource(EngineHost::new(engine));
    app.world_mut().resource_mut::<Encounters>().open(director);

    app.init_resource::<SeenEvents>();
    app.add_systems(FixedUpdate, collect_events.after(tick_encounters));

    (app, boss)
}

#[test]
fn test_boss_dies_and_is_removed() {
    let (mut app, boss) = create_boss_app(42);

    let mut updates = 0;
    loop {
        app.update();
        updates += 1;

        let encounters = app.world().resource::<Encounters>();
        let director = encounters.get(0).expect("encounter 0");
        if director.actor(boss).is_none() {
            break;
        }
        assert!(updates < 2000, "Босс не удалён за 2000 тиков");
    }

    let encounters = app.world().resource::<Encounters>();
    let director = encounters.get(0).expect("encounter 0");
    let report = director
        .deaths()
        .iter()
        .find(|report| report.actor == boss)
        .expect("boss death report");
    assert_eq!(report.cause, DeathCause::Killed);
    assert_eq!(report.score, 1000);

    let seen = &app.world().resource::<SeenEvents>().0;
    assert!(seen
        .iter()
        .any(|e| matches!(e, EncounterEvent::ActorDied(report) if report.actor == boss)));
    assert!(seen
        .iter()
        .any(|e| matches!(e, EncounterEvent::ActorRemoved { actor } if *actor == boss)));

    // Все DamageDealt по боссу: не больше 12 (500 hp / 12 ударов)
    let hits = seen
        .iter()
        .filter(|e| matches!(e, EncounterEvent::DamageDealt { victim, .. } if *victim == boss))
        .count();
    assert_eq!(hits, 12);
}

#[test]
fn test_no_engine_host_is_noop() {
    let mut app = create_headless_app(7);
    let registry = presets::registry().expect("presets are valid");
    let director = EncounterDirector::new(registry, EncounterSettings::default(), 7).expect("director");
    app.world_mut().resource_mut::<Encounters>().open(director);

    for _ in 0..10 {
        app.update();
    }

    let encounters = app.world().resource::<Encounters>();
    assert_eq!(encounters.len(), 1);
    assert_eq!(encounters.get(0).expect("encounter 0").ticks(), 0);
}

#[test]
fn test_fixed_update_advances_director() {
    let (mut app, _) = create_boss_app(3);

    // Первый update: delta = 0, FixedUpdate не запускается
    for _ in 0..11 {
        app.update();
    }

    let encounters = app.world().resource::<Encounters>();
    let director = encounters.get(0).expect("encounter 0");
    assert_eq!(director.ticks(), 10);
    assert!((director.elapsed() - 10.0 / 60.0).abs() < 1e-4);
}

#[test]
fn test_open_seeded_forks_from_root_rng() {
    let config = EncounterConfig::new("seeded");

    let mut root = DeterministicRng::new(5);
    let mut replay = DeterministicRng::new(5);
    let mut encounters = Encounters::default();
    let mut replayed = Encounters::default();

    for _ in 0..2 {
        encounters.open_seeded(&config, &mut root).expect("open");
        replayed.open_seeded(&config, &mut replay).expect("open");
    }

    let seeds: Vec<u64> = encounters.directors().iter().map(|d| d.seed()).collect();
    let replayed_seeds: Vec<u64> = replayed.directors().iter().map(|d| d.seed()).collect();
    assert_eq!(seeds, replayed_seeds);
    assert_ne!(seeds[0], seeds[1], "каждый encounter получает свой seed");
}

#[test]
fn test_close_shuts_down_and_removes_encounter() {
    let (mut app, _) = create_boss_app(11);
    app.update();
    app.update();

    let closed = app.world_mut().resource_scope(|world, mut host: Mut<EngineHost>| {
        world.resource_mut::<Encounters>().close(0, &mut *host.0)
    });
    let closed = closed.expect("encounter 0 closed");
    assert!(closed.is_shut_down());
    assert!(closed.actors().is_empty());
    assert!(app.world().resource::<Encounters>().is_empty());

    // Тик без encounters: ничего не падает
    app.update();
}

#[test]
fn test_shut_down_encounters_are_pruned_after_tick() {
    let (mut app, boss) = create_boss_app(12);
    app.update();
    app.update();

    app.world_mut().resource_scope(|world, mut host: Mut<EngineHost>| {
        let mut encounters = world.resource_mut::<Encounters>();
        let director = encounters.get_mut(0).expect("encounter 0");
        director.shutdown(&mut *host.0);
    });

    app.update();

    assert!(app.world().resource::<Encounters>().is_empty());
    // Последние события закрытого encounter'а всё равно дошли до Bevy
    let seen = &app.world().resource::<SeenEvents>().0;
    assert!(seen
        .iter()
        .any(|e| matches!(e, EncounterEvent::ActorRemoved { actor } if *actor == boss)));
}
