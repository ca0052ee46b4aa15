//! ActorDefinition: per-type конфиг актора (states, урон, фазы, тело)
//!
//! Все числа (скорости, длительности, урон) живут здесь, а не в коде
//! behavior'ов: варианты босса отличаются только данными.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;

use super::{StateDefinition, StateKind};
use crate::combat::{DamageProfile, DamageRules};
use crate::effects::CueSpec;
use crate::engine::BodyType;
use crate::error::DefinitionError;

fn default_one() -> f32 {
    1.0
}

/// Настройка физического тела при spawn
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BodySetup {
    #[serde(default)]
    pub body_type: BodyType,
    #[serde(default = "default_one")]
    pub gravity_scale: f32,
}

impl Default for BodySetup {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            gravity_scale: 1.0,
        }
    }
}

impl BodySetup {
    /// Летающий актор (kinematic, без гравитации)
    pub fn floating() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            gravity_scale: 0.0,
        }
    }
}

/// Фаза босса: health опустилось ниже порога
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseRule {
    /// Доля max health, ниже которой фаза включается
    pub below_fraction: f32,
    /// Принудительный state при входе в фазу
    #[serde(default)]
    pub enter: Option<StateKind>,
    /// Множитель скоростей behaviors
    #[serde(default = "default_one")]
    pub speed_scale: f32,
    #[serde(default)]
    pub on_enter: Vec<CueSpec>,
}

impl PhaseRule {
    pub fn below(fraction: f32) -> Self {
        Self {
            below_fraction: fraction,
            enter: None,
            speed_scale: 1.0,
            on_enter: Vec::new(),
        }
    }

    pub fn forcing(mut self, state: StateKind) -> Self {
        self.enter = Some(state);
        self
    }

    pub fn speed(mut self, scale: f32) -> Self {
        self.speed_scale = scale;
        self
    }

    pub fn cue(mut self, cue: CueSpec) -> Self {
        self.on_enter.push(cue);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorDefinition {
    pub name: String,
    pub prefab: String,
    pub max_health: f32,
    #[serde(default)]
    pub body: BodySetup,
    pub initial_state: StateKind,
    pub states: Vec<StateDefinition>,
    #[serde(default)]
    pub damage: DamageRules,
    #[serde(default)]
    pub phases: Vec<PhaseRule>,
    /// Очки за убийство (для DeathReport)
    #[serde(default)]
    pub score: u32,
}

impl ActorDefinition {
    pub fn new(name: impl Into<String>, prefab: impl Into<String>, max_health: f32, initial_state: StateKind) -> Self {
        Self {
            name: name.into(),
            prefab: prefab.into(),
            max_health,
            body: BodySetup::default(),
            initial_state,
            states: Vec::new(),
            damage: DamageRules::default(),
            phases: Vec::new(),
            score: 0,
        }
    }

    pub fn with_state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_body(mut self, body: BodySetup) -> Self {
        self.body = body;
        self
    }

    pub fn with_damage(mut self, profile: DamageProfile) -> Self {
        self.damage.profiles.push(profile);
        self
    }

    pub fn with_invulnerability(mut self, seconds: f32) -> Self {
        self.damage.invulnerability = seconds;
        self
    }

    pub fn with_phase(mut self, phase: PhaseRule) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }

    pub fn state(&self, kind: StateKind) -> Option<&StateDefinition> {
        self.states.iter().find(|state| state.kind == kind)
    }

    pub fn declares(&self, kind: StateKind) -> bool {
        self.state(kind).is_some()
    }

    /// Типы акторов, которых призывают states этого типа
    pub fn summons(&self) -> impl Iterator<Item = &str> {
        self.states.iter().filter_map(|state| state.behavior.summons())
    }

    /// Fail-fast проверка transition table и чисел
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let actor = || self.name.clone();

        if self.states.is_empty() {
            return Err(DefinitionError::NoStates { actor: actor() });
        }

        if !self.max_health.is_finite() || self.max_health <= 0.0 {
            return Err(DefinitionError::InvalidHealth {
                actor: actor(),
                value: self.max_health,
            });
        }

        let mut declared = BTreeSet::new();
        for state in &self.states {
            if !declared.insert(state.kind) {
                return Err(DefinitionError::DuplicateState {
                    actor: actor(),
                    state: state.kind,
                });
            }
        }

        if !declared.contains(&self.initial_state) {
            return Err(DefinitionError::MissingInitial {
                actor: actor(),
                state: self.initial_state,
            });
        }

        let Some(dead) = self.state(StateKind::Dead) else {
            return Err(DefinitionError::MissingDeadState { actor: actor() });
        };
        if !dead.next.is_stay() || dead.sensor.is_some() {
            return Err(DefinitionError::DeadStateHasExit { actor: actor() });
        }

        for state in &self.states {
            self.validate_state(state, &declared)?;
        }

        self.validate_phases(&declared)
    }

    fn validate_state(&self, state: &StateDefinition, declared: &BTreeSet<StateKind>) -> Result<(), DefinitionError> {
        let valid_seconds = |value: f32| value.is_finite() && value >= 0.0;

        for value in state.duration.into_iter().chain([state.duration_jitter]) {
            if !valid_seconds(value) {
                return Err(DefinitionError::InvalidDuration {
                    actor: self.name.clone(),
                    state: state.kind,
                    value,
                });
            }
        }

        match &state.next {
            super::NextState::Uniform(options) if options.is_empty() => {
                return Err(DefinitionError::EmptyChoice {
                    actor: self.name.clone(),
                    state: state.kind,
                });
            }
            super::NextState::Weighted(options) => {
                if options.is_empty() {
                    return Err(DefinitionError::EmptyChoice {
                        actor: self.name.clone(),
                        state: state.kind,
                    });
                }
                if let Some((_, weight)) = options.iter().find(|(_, w)| !w.is_finite() || *w <= 0.0) {
                    return Err(DefinitionError::InvalidWeight {
                        actor: self.name.clone(),
                        state: state.kind,
                        weight: *weight,
                    });
                }
            }
            _ => {}
        }

        if let Some(target) = state.targets().into_iter().find(|target| !declared.contains(target)) {
            return Err(DefinitionError::UndeclaredState {
                actor: self.name.clone(),
                from: state.kind,
                target,
            });
        }

        Ok(())
    }

    fn validate_phases(&self, declared: &BTreeSet<StateKind>) -> Result<(), DefinitionError> {
        let mut previous = 1.0;
        for (index, phase) in self.phases.iter().enumerate() {
            let value = phase.below_fraction;
            if !(value > 0.0 && value < 1.0 && value < previous) {
                return Err(DefinitionError::InvalidPhaseThreshold {
                    actor: self.name.clone(),
                    value,
                });
            }
            previous = value;

            if let Some(target) = phase.enter {
                if !declared.contains(&target) || target.is_dead() {
                    return Err(DefinitionError::UndeclaredPhaseState {
                        actor: self.name.clone(),
                        phase: index + 1,
                        target,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Все типы акторов, доступные encounter'у (по имени)
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, Arc<ActorDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ActorDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.definitions.contains_key(&definition.name) {
            return Err(DefinitionError::DuplicateActor(definition.name));
        }
        self.definitions.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ActorDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Список definitions в RON (`[ (name: ..., ...), ... ]`)
    pub fn from_ron_str(source: &str) -> Result<Self, DefinitionError> {
        let definitions: Vec<ActorDefinition> = ron::from_str(source)?;
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        registry.validate_references()?;
        Ok(registry)
    }

    /// Summon behaviors ссылаются только на зарегистрированные типы
    pub fn validate_references(&self) -> Result<(), DefinitionError> {
        for definition in self.definitions.values() {
            if let Some(summon) = definition.summons().find(|summon| !self.contains(summon)) {
                return Err(DefinitionError::UnknownSummon {
                    actor: definition.name.clone(),
                    summon: summon.to_string(),
                });
            }
        }
        Ok(())
    }
}
