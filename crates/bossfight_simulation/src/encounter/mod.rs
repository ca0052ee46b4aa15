//! Encounter module: один бой = один EncounterDirector
//!
//! ECS ответственность:
//! - Fixed 60Hz tick всех encounters
//! - EncounterEvent как Bevy event (UI, score, аудио слушают его)
//!
//! Движок (EngineHost) ответственность:
//! - Transform, physics, collision queries, prefabs, эффекты

use bevy::prelude::*;

pub mod director;
pub mod events;
pub mod settings;
pub mod waves;


// Re-export основных типов
pub use director::EncounterDirector;
pub use events::{log_event, DeathCause, DeathReport, EncounterEvent};
pub use settings::{Arena, EncounterConfig, EncounterSettings};
pub use waves::{SpawnPoint, WaveDefinition, WaveSchedule, WaveTrigger};

use crate::engine::EngineBridge;
use crate::error::DefinitionError;
use crate::DeterministicRng;

/// Активные encounters (тикаются в порядке открытия)
#[derive(Resource, Debug, Default)]
pub struct Encounters {
    directors: Vec<EncounterDirector>,
}

impl Encounters {
    /// Добавить encounter; возвращает его индекс
    pub fn open(&mut self, director: EncounterDirector) -> usize {
        crate::log_info(&format!("⚔️ Encounter `{}` opened", director.name()));
        self.directors.push(director);
        self.directors.len() - 1
    }

    /// Encounter из конфига; seed форкается из корневого DeterministicRng
    /// (если конфиг не задал свой)
    pub fn open_seeded(&mut self, config: &EncounterConfig, rng: &mut DeterministicRng) -> Result<usize, DefinitionError> {
        let seed = rng.fork_stream().seed();
        let director = EncounterDirector::from_config(config, seed)?;
        Ok(self.open(director))
    }

    /// Shutdown + удалить из списка (индексы следующих сдвигаются)
    pub fn close(&mut self, index: usize, engine: &mut dyn EngineBridge) -> Option<EncounterDirector> {
        if index >= self.directors.len() {
            return None;
        }
        let mut director = self.directors.remove(index);
        director.shutdown(engine);
        Some(director)
    }

    /// Убрать encounters, которые уже shut down; возвращает сколько убрано
    pub fn prune_closed(&mut self) -> usize {
        let before = self.directors.len();
        self.directors.retain(|director| !director.is_shut_down());
        before - self.directors.len()
    }

    pub fn get(&self, index: usize) -> Option<&EncounterDirector> {
        self.directors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EncounterDirector> {
        self.directors.get_mut(index)
    }

    pub fn directors(&self) -> &[EncounterDirector] {
        &self.directors
    }

    pub fn directors_mut(&mut self) -> &mut [EncounterDirector] {
        &mut self.directors
    }

    pub fn len(&self) -> usize {
        self.directors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directors.is_empty()
    }
}

/// Движок, на котором крутятся encounters
#[derive(Resource)]
pub struct EngineHost(pub Box<dyn EngineBridge + Send + Sync>);

impl EngineHost {
    pub fn new(engine: impl EngineBridge + Send + Sync + 'static) -> Self {
        Self(Box::new(engine))
    }
}

/// Encounter Plugin
///
/// Регистрирует системы в FixedUpdate (60Hz).
/// Порядок выполнения:
/// 1. tick_encounters: тик всех directors, события в Events<EncounterEvent>
/// 2. log_encounter_events: лог событий этого тика
pub struct EncounterPlugin;

impl Plugin for EncounterPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<EncounterEvent>().init_resource::<Encounters>();

        app.add_systems(
            FixedUpdate,
            (tick_encounters, log_encounter_events).chain(), // Последовательно для детерминизма
        );
    }
}

/// Система: тик всех encounters + шаг физики хоста
///
/// Без EngineHost ничего не делает (encounters ждут движок).
/// Shut down encounters убираются после тика (их последние события уже отправлены).
pub fn tick_encounters(
    time: Res<Time<Fixed>>,
    host: Option<ResMut<EngineHost>>,
    mut encounters: ResMut<Encounters>,
    mut events: EventWriter<EncounterEvent>,
) {
    let Some(mut host) = host else {
        return;
    };

    let dt = time.delta_secs();
    let engine = &mut *host.0;

    for director in encounters.directors_mut() {
        director.tick(engine, dt);
        events.write_batch(director.drain_events());
    }
    encounters.prune_closed();

    engine.integrate(dt);
}

/// Система: лог событий encounter'ов
pub fn log_encounter_events(mut events: EventReader<EncounterEvent>) {
    for event in events.read() {
        log_event("fixed", event);
    }
}
