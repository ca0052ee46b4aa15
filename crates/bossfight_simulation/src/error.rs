//! Ошибки симуляции
//!
//! Невалидные definitions ловятся при старте (fail fast), а не посреди боя.
//! Runtime-проблемы движка (пропавшая entity) ошибками не являются:
//! актор просто считается мёртвым.

use thiserror::Error;

use crate::ai::StateKind;

/// Ошибка в описании актора или encounter'а
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("actor `{actor}` declares no states")]
    NoStates { actor: String },

    #[error("actor `{actor}` declares state {state:?} more than once")]
    DuplicateState { actor: String, state: StateKind },

    #[error("actor `{actor}`: state {from:?} references undeclared state {target:?}")]
    UndeclaredState {
        actor: String,
        from: StateKind,
        target: StateKind,
    },

    #[error("actor `{actor}`: initial state {state:?} is not declared")]
    MissingInitial { actor: String, state: StateKind },

    #[error("actor `{actor}` has no Dead state")]
    MissingDeadState { actor: String },

    #[error("actor `{actor}`: Dead state must not have outgoing transitions")]
    DeadStateHasExit { actor: String },

    #[error("actor `{actor}`: state {state:?} has an empty choice set")]
    EmptyChoice { actor: String, state: StateKind },

    #[error("actor `{actor}`: state {state:?} has invalid weight {weight}")]
    InvalidWeight {
        actor: String,
        state: StateKind,
        weight: f32,
    },

    #[error("actor `{actor}`: max health must be positive and finite (got {value})")]
    InvalidHealth { actor: String, value: f32 },

    #[error("actor `{actor}`: state {state:?} has invalid duration {value}")]
    InvalidDuration {
        actor: String,
        state: StateKind,
        value: f32,
    },

    #[error("actor `{actor}`: phase thresholds must lie in (0, 1) and strictly decrease (got {value})")]
    InvalidPhaseThreshold { actor: String, value: f32 },

    #[error("actor `{actor}` summons unknown actor type `{summon}`")]
    UnknownSummon { actor: String, summon: String },

    #[error("actor type `{0}` is defined more than once")]
    DuplicateActor(String),

    #[error("actor `{actor}`: phase {phase} forces undeclared state {target:?}")]
    UndeclaredPhaseState {
        actor: String,
        phase: usize,
        target: StateKind,
    },

    #[error("wave `{wave}` spawns unknown actor type `{actor}`")]
    UnknownWaveActor { wave: String, actor: String },

    #[error("failed to parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Ошибка явного `EncounterDirector::spawn`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("unknown actor type `{0}`")]
    UnknownActorType(String),

    #[error("roster is full ({limit} living actors)")]
    RosterFull { limit: usize },

    #[error("engine failed to instantiate prefab `{prefab}`")]
    InstantiateFailed { prefab: String },

    #[error("encounter is shut down")]
    EncounterClosed,
}
