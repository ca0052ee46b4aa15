//! Encounter events: что произошло за тик (для хоста, UI, score, логов)
//!
//! Director копит события в буфере; Bevy система `tick_encounters`
//! переливает их в `Events<EncounterEvent>`.

use bevy::math::Vec2;
use bevy::prelude::Event;

use crate::actor::ActorId;
use crate::ai::{StateKind, TransitionCause};
use crate::combat::{ProjectileFate, ProjectileId};
use crate::engine::{Category, EntityHandle};

/// Почему актор покинул roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Health дошло до 0, death animation доиграла
    Killed,
    /// Движок потерял entity
    Vanished,
}

/// Запись в death ledger
#[derive(Debug, Clone, PartialEq)]
pub struct DeathReport {
    pub actor: ActorId,
    pub type_name: String,
    pub position: Vec2,
    pub score: u32,
    /// Кто нанёс последний удар
    pub killer: Option<EntityHandle>,
    pub cause: DeathCause,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub enum EncounterEvent {
    ActorSpawned {
        actor: ActorId,
        type_name: String,
        handle: EntityHandle,
        position: Vec2,
    },
    DamageDealt {
        attacker: EntityHandle,
        victim: ActorId,
        category: Category,
        amount: f32,
        lethal: bool,
    },
    StateChanged {
        actor: ActorId,
        from: StateKind,
        to: StateKind,
        cause: TransitionCause,
    },
    /// Health пересекло порог фазы (phase начинается с 1)
    PhaseChanged {
        actor: ActorId,
        phase: usize,
    },
    /// Health 0 (или entity пропал); actor ещё в roster до конца death animation
    ActorDied(DeathReport),
    /// Entity уничтожен, запись удалена из roster
    ActorRemoved {
        actor: ActorId,
    },
    ProjectileFired {
        projectile: ProjectileId,
        owner: ActorId,
        handle: EntityHandle,
    },
    ProjectileHit {
        projectile: ProjectileId,
        target: EntityHandle,
        damage: f32,
    },
    ProjectileDestroyed {
        projectile: ProjectileId,
        fate: ProjectileFate,
    },
    WaveReleased {
        wave: String,
        spawned: usize,
    },
    /// Spawn/выстрел, отброшенный из-за лимитов
    RequestDropped {
        actor: ActorId,
        reason: String,
    },
}

impl EncounterEvent {
    /// Актор, к которому относится событие
    pub fn actor(&self) -> Option<ActorId> {
        match self {
            EncounterEvent::ActorSpawned { actor, .. }
            | EncounterEvent::StateChanged { actor, .. }
            | EncounterEvent::PhaseChanged { actor, .. }
            | EncounterEvent::ActorRemoved { actor }
            | EncounterEvent::RequestDropped { actor, .. } => Some(*actor),
            EncounterEvent::DamageDealt { victim, .. } => Some(*victim),
            EncounterEvent::ActorDied(report) => Some(report.actor),
            EncounterEvent::ProjectileFired { owner, .. } => Some(*owner),
            EncounterEvent::ProjectileHit { .. }
            | EncounterEvent::ProjectileDestroyed { .. }
            | EncounterEvent::WaveReleased { .. } => None,
        }
    }
}

/// Записать событие в лог (уровень по важности)
pub fn log_event(encounter: &str, event: &EncounterEvent) {
    match event {
        EncounterEvent::ActorSpawned {
            actor,
            type_name,
            position,
            ..
        } => crate::log(&format!(
            "🎬 [{}] {} ({}) spawned at ({:.1}, {:.1})",
            encounter, actor, type_name, position.x, position.y
        )),
        EncounterEvent::DamageDealt {
            attacker,
            victim,
            category,
            amount,
            lethal,
        } => crate::log(&format!(
            "💥 [{}] {} hit {} via {:?} for {:.1}{}",
            encounter,
            attacker,
            victim,
            category,
            amount,
            if *lethal { " (lethal)" } else { "" }
        )),
        EncounterEvent::StateChanged { actor, from, to, cause } => crate::log(&format!(
            "🤖 [{}] {}: {:?} → {:?} ({:?})",
            encounter, actor, from, to, cause
        )),
        EncounterEvent::PhaseChanged { actor, phase } => {
            crate::log_info(&format!("🔥 [{}] {} entered phase {}", encounter, actor, phase))
        }
        EncounterEvent::ActorDied(report) => crate::log_info(&format!(
            "💀 [{}] {} ({}) died at ({:.1}, {:.1}), cause {:?}, score {}",
            encounter, report.actor, report.type_name, report.position.x, report.position.y, report.cause, report.score
        )),
        EncounterEvent::ActorRemoved { actor } => crate::log(&format!("🗑️ [{}] {} removed", encounter, actor)),
        EncounterEvent::ProjectileFired { projectile, owner, .. } => crate::log(&format!(
            "🔫 [{}] {} fired projectile #{}",
            encounter, owner, projectile.0
        )),
        EncounterEvent::ProjectileHit {
            projectile,
            target,
            damage,
        } => crate::log_info(&format!(
            "🎯 [{}] projectile #{} hit {} for {:.1}",
            encounter, projectile.0, target, damage
        )),
        EncounterEvent::ProjectileDestroyed { projectile, fate } => crate::log(&format!(
            "🔫 [{}] projectile #{} destroyed ({:?})",
            encounter, projectile.0, fate
        )),
        EncounterEvent::WaveReleased { wave, spawned } => {
            crate::log_info(&format!("🌊 [{}] wave `{}` released ({} actors)", encounter, wave, spawned))
        }
        EncounterEvent::RequestDropped { actor, reason } => {
            crate::log_warning(&format!("⚠️ [{}] request from {} dropped: {}", encounter, actor, reason))
        }
    }
}
