//! Spawn waves: группы акторов, выпускаемые по времени или после зачистки

use bevy::math::Vec2;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum WaveTrigger {
    /// Секунды с начала encounter'а
    AtTime(f32),
    /// Roster пуст и все предыдущие волны уже выпущены
    WhenCleared,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnPoint {
    pub actor: String,
    pub position: (f32, f32),
}

impl SpawnPoint {
    pub fn new(actor: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            actor: actor.into(),
            position: (x, y),
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.position.0, self.position.1)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaveDefinition {
    pub name: String,
    pub trigger: WaveTrigger,
    pub spawns: Vec<SpawnPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct WaveSchedule {
    waves: Vec<WaveDefinition>,
    released: Vec<bool>,
}

impl WaveSchedule {
    pub fn new(waves: Vec<WaveDefinition>) -> Self {
        let released = vec![false; waves.len()];
        Self { waves, released }
    }

    pub fn waves(&self) -> &[WaveDefinition] {
        &self.waves
    }

    pub fn pending(&self) -> usize {
        self.released.iter().filter(|released| !**released).count()
    }

    pub fn is_finished(&self) -> bool {
        self.pending() == 0
    }

    /// Волны, которые пора выпустить (помечаются выпущенными)
    ///
    /// После любой выпущенной волны roster уже не пуст, так что WhenCleared
    /// в том же вызове не срабатывает.
    pub fn due(&mut self, elapsed: f32, cleared: bool) -> Vec<WaveDefinition> {
        let mut due = Vec::new();
        let mut cleared = cleared;

        for index in 0..self.waves.len() {
            if self.released[index] {
                continue;
            }

            let earlier_pending = self.released[..index].iter().any(|released| !*released);
            let ready = match self.waves[index].trigger {
                WaveTrigger::AtTime(at) => elapsed >= at,
                WaveTrigger::WhenCleared => cleared && !earlier_pending,
            };

            if ready {
                self.released[index] = true;
                cleared = false;
                due.push(self.waves[index].clone());
            }
        }

        due
    }
}
