//! Bossfight Simulation Core
//!
//! Враждебные акторы (FSM), разрешение урона, снаряды и фазы босса.
//! Симуляция ничего не рисует и не считает физику сама: всё это делает
//! хост-движок через traits из `engine`.
//!
//! HYBRID ARCHITECTURE:
//! - Simulation = game state, AI decisions, combat rules (детерминированно)
//! - Engine = transforms, physics, collisions, prefabs, particles/audio/camera

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

// Публичные модули
pub mod actor;
pub mod ai;
pub mod combat;
pub mod effects;
pub mod encounter;
pub mod engine;
pub mod error;
pub mod logger;
pub mod rng;
pub mod timer;

// Re-export базовых типов для удобства
pub use actor::{Actor, ActorId, Facing, Health};
pub use ai::{ActorDefinition, DefinitionRegistry, StateKind};
pub use encounter::{
    EncounterConfig, EncounterDirector, EncounterEvent, EncounterPlugin, EncounterSettings, Encounters, EngineHost,
};
pub use engine::{EngineBridge, EntityHandle, HeadlessEngine};
pub use error::{DefinitionError, SpawnError};
pub use logger::{
    init_logger, log, log_error, log_info, log_level, log_warning, log_with_level, set_log_level, set_logger,
    set_logger_if_needed, ConsoleLogger, LogLevel, LogPrinter,
};
pub use rng::RandomStream;
pub use timer::Countdown;

/// Частота симуляции
pub const SIMULATION_HZ: f64 = 60.0;

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Fixed timestep 60Hz для simulation tick
        app.insert_resource(Time::<Fixed>::from_hz(SIMULATION_HZ));

        // Детерминистичный RNG (seed по умолчанию, если хост не задал свой)
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app.add_plugins(EncounterPlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
///
/// Корневой поток: encounters получают свои seeds через `fork_stream`
/// (см. `Encounters::open_seeded`).
#[derive(Resource, Debug)]
pub struct DeterministicRng {
    pub stream: RandomStream,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            stream: RandomStream::new(seed),
            seed,
        }
    }

    /// Независимый дочерний поток (seed нового encounter'а)
    pub fn fork_stream(&mut self) -> RandomStream {
        self.stream.fork()
    }
}

/// Создаёт minimal Bevy App для headless симуляции
///
/// Каждый `app.update()` (кроме первого, с нулевым delta) прогоняет ровно
/// один FixedUpdate тик.
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / SIMULATION_HZ,
        )))
        .add_plugins(SimulationPlugin);

    app
}
