//! States и transition table одного типа актора

use serde::Deserialize;

use super::behavior::Behavior;
use crate::effects::CueSpec;
use crate::rng::RandomStream;

/// Фаза поведения актора
///
/// Каждый тип объявляет своё подмножество (босс: Smash/Clap/SummonEnemies,
/// обычный враг: Patrolling/Charging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum StateKind {
    Spawning,
    Idle,
    Patrolling,
    Windup,
    Charging,
    Attacking,
    Shooting,
    Smash,
    Clap,
    SummonEnemies,
    Recovering,
    BeingHit,
    Dead,
}

impl StateKind {
    pub fn is_dead(self) -> bool {
        self == StateKind::Dead
    }
}

/// Куда идти, когда state закончился (timer или `finish()`)
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub enum NextState {
    /// Остаться (Dead, бесконечный Idle)
    #[default]
    Stay,
    Fixed(StateKind),
    /// Равновероятно из набора
    Uniform(Vec<StateKind>),
    /// По весам (атаки босса)
    Weighted(Vec<(StateKind, f32)>),
}

impl NextState {
    /// Выбор следующего state (`None` для Stay)
    pub fn choose(&self, rng: &mut RandomStream) -> Option<StateKind> {
        match self {
            NextState::Stay => None,
            NextState::Fixed(kind) => Some(*kind),
            NextState::Uniform(options) => {
                let index = rng.next_int(0, options.len() as i32);
                options.get(index as usize).copied()
            }
            NextState::Weighted(options) => {
                let weights: Vec<f32> = options.iter().map(|(_, weight)| *weight).collect();
                rng.pick_weighted(&weights).and_then(|index| options.get(index)).map(|(kind, _)| *kind)
            }
        }
    }

    /// Все states, на которые ссылается правило
    pub fn targets(&self) -> Vec<StateKind> {
        match self {
            NextState::Stay => Vec::new(),
            NextState::Fixed(kind) => vec![*kind],
            NextState::Uniform(options) => options.clone(),
            NextState::Weighted(options) => options.iter().map(|(kind, _)| *kind).collect(),
        }
    }

    pub fn is_stay(&self) -> bool {
        matches!(self, NextState::Stay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SensorTrigger {
    #[default]
    PlayerInside,
    PlayerOutside,
}

/// Sensor region вокруг актора (радиус до игрока)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorRule {
    pub radius: f32,
    #[serde(default)]
    pub trigger: SensorTrigger,
    pub enter: StateKind,
}

impl SensorRule {
    pub fn inside(radius: f32, enter: StateKind) -> Self {
        Self {
            radius,
            trigger: SensorTrigger::PlayerInside,
            enter,
        }
    }

    pub fn outside(radius: f32, enter: StateKind) -> Self {
        Self {
            radius,
            trigger: SensorTrigger::PlayerOutside,
            enter,
        }
    }

    /// Сработал ли sensor при данной дистанции до игрока
    pub fn triggered(&self, distance: f32) -> bool {
        match self.trigger {
            SensorTrigger::PlayerInside => distance <= self.radius,
            SensorTrigger::PlayerOutside => distance > self.radius,
        }
    }
}

/// Описание одного state
#[derive(Debug, Clone, Deserialize)]
pub struct StateDefinition {
    pub kind: StateKind,
    #[serde(default)]
    pub behavior: Behavior,
    /// Сколько длится state (None → пока behavior не вызовет finish)
    #[serde(default)]
    pub duration: Option<f32>,
    /// Добавка к duration, равномерно в [0, jitter)
    #[serde(default)]
    pub duration_jitter: f32,
    #[serde(default)]
    pub next: NextState,
    #[serde(default)]
    pub sensor: Option<SensorRule>,
    #[serde(default)]
    pub on_enter: Vec<CueSpec>,
    #[serde(default)]
    pub on_exit: Vec<CueSpec>,
}

impl StateDefinition {
    pub fn new(kind: StateKind) -> Self {
        Self {
            kind,
            behavior: Behavior::default(),
            duration: None,
            duration_jitter: 0.0,
            next: NextState::Stay,
            sensor: None,
            on_enter: Vec::new(),
            on_exit: Vec::new(),
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn lasting(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn jitter(mut self, seconds: f32) -> Self {
        self.duration_jitter = seconds;
        self
    }

    pub fn then(mut self, next: NextState) -> Self {
        self.next = next;
        self
    }

    pub fn sensor(mut self, sensor: SensorRule) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn enter_cue(mut self, cue: CueSpec) -> Self {
        self.on_enter.push(cue);
        self
    }

    pub fn exit_cue(mut self, cue: CueSpec) -> Self {
        self.on_exit.push(cue);
        self
    }

    /// Длительность для нового входа в state (с jitter)
    pub(crate) fn roll_duration(&self, rng: &mut RandomStream) -> Option<f32> {
        let base = self.duration?;
        if self.duration_jitter > 0.0 {
            Some(base + rng.next_range(0.0, self.duration_jitter))
        } else {
            Some(base)
        }
    }

    /// Все states, на которые этот ссылается (next + sensor)
    pub fn targets(&self) -> Vec<StateKind> {
        let mut targets = self.next.targets();
        if let Some(sensor) = &self.sensor {
            targets.push(sensor.enter);
        }
        targets
    }
}
