//! Встроенные типы акторов: grunt, hand enemy, clap boss
//!
//! Таблица параметров per-type; RON конфиги могут добавлять свои типы поверх.

use super::{
    ActorDefinition, Behavior, BodySetup, DefinitionRegistry, NextState, PhaseRule, SensorRule, StateDefinition,
    StateKind,
};
use crate::combat::{DamageProfile, ProjectileSpec};
use crate::effects::{CueSpec, ParticleStyle};
use crate::engine::Category;
use crate::error::DefinitionError;

pub const GRUNT: &str = "grunt";
pub const HAND_ENEMY: &str = "hand_enemy";
pub const CLAP_BOSS: &str = "clap_boss";

/// Prefab → категория, которую движок должен повесить на instance
pub const PREFABS: [(&str, Category); 5] = [
    (GRUNT, Category::Enemy),
    (HAND_ENEMY, Category::Enemy),
    (CLAP_BOSS, Category::Enemy),
    ("hand_bullet", Category::Projectile),
    ("boss_bullet", Category::Projectile),
];

/// Урон, после 12 попаданий которым босс гарантированно мёртв
pub const BOSS_HIT_DAMAGE: f32 = 500.0 / 12.0;

pub fn registry() -> Result<DefinitionRegistry, DefinitionError> {
    let mut registry = DefinitionRegistry::new();
    registry.register(grunt())?;
    registry.register(hand_enemy())?;
    registry.register(clap_boss())?;
    registry.validate_references()?;
    Ok(registry)
}

/// Наземный враг: патруль, замечает игрока → замах → рывок
pub fn grunt() -> ActorDefinition {
    ActorDefinition::new(GRUNT, GRUNT, 60.0, StateKind::Spawning)
        .with_state(
            StateDefinition::new(StateKind::Spawning)
                .lasting(0.5)
                .then(NextState::Fixed(StateKind::Patrolling))
                .enter_cue(CueSpec::particles((0.0, 1.0), 10, 0.4, ParticleStyle::Dust)),
        )
        .with_state(
            StateDefinition::new(StateKind::Patrolling)
                .behavior(Behavior::Patrol { speed: 2.0 })
                .lasting(3.0)
                .jitter(1.0)
                .then(NextState::Uniform(vec![StateKind::Idle, StateKind::Patrolling]))
                .sensor(SensorRule::inside(6.0, StateKind::Windup)),
        )
        .with_state(
            StateDefinition::new(StateKind::Idle)
                .lasting(1.0)
                .then(NextState::Fixed(StateKind::Patrolling))
                .sensor(SensorRule::inside(6.0, StateKind::Windup)),
        )
        .with_state(
            StateDefinition::new(StateKind::Windup)
                .lasting(0.4)
                .then(NextState::Fixed(StateKind::Charging))
                .enter_cue(CueSpec::sound("grunt_growl")),
        )
        .with_state(
            StateDefinition::new(StateKind::Charging)
                .behavior(Behavior::Charge { speed: 9.0 })
                .lasting(1.2)
                .then(NextState::Fixed(StateKind::Recovering)),
        )
        .with_state(
            StateDefinition::new(StateKind::Recovering)
                .lasting(0.6)
                .then(NextState::Fixed(StateKind::Patrolling)),
        )
        .with_state(
            StateDefinition::new(StateKind::BeingHit)
                .behavior(Behavior::Flinch { knockback_scale: 1.0 })
                .lasting(0.35)
                .then(NextState::Fixed(StateKind::Idle))
                .enter_cue(CueSpec::sound("grunt_hurt")),
        )
        .with_state(
            StateDefinition::new(StateKind::Dead)
                .behavior(Behavior::Dying {
                    burst_interval: 0.2,
                    style: ParticleStyle::Smoke,
                })
                .lasting(0.8)
                .enter_cue(CueSpec::sound("grunt_death")),
        )
        .with_damage(DamageProfile::new(Category::Weapon, 25.0).with_knockback(6.0, 3.0))
        .with_damage(DamageProfile::new(Category::Projectile, 15.0).with_knockback(3.0, 1.0))
        .with_damage(DamageProfile::new(Category::Hazard, 100.0))
        .with_invulnerability(0.4)
        .with_score(10)
}

/// Летающая рука босса: парит над игроком, стреляет очередями
pub fn hand_enemy() -> ActorDefinition {
    let bullet = ProjectileSpec {
        prefab: "hand_bullet".to_string(),
        speed: 8.0,
        lifetime: 2.0,
        damage: 10.0,
        sound: Some("hand_shot".to_string()),
    };

    ActorDefinition::new(HAND_ENEMY, HAND_ENEMY, 40.0, StateKind::Spawning)
        .with_body(BodySetup::floating())
        .with_state(
            StateDefinition::new(StateKind::Spawning)
                .lasting(0.6)
                .then(NextState::Fixed(StateKind::Idle))
                .enter_cue(CueSpec::particles((0.0, 1.0), 12, 0.3, ParticleStyle::Flash)),
        )
        .with_state(
            StateDefinition::new(StateKind::Idle)
                .behavior(Behavior::Hover {
                    height: 3.0,
                    speed: 4.0,
                })
                .lasting(1.5)
                .jitter(0.5)
                .then(NextState::Weighted(vec![(StateKind::Shooting, 2.0), (StateKind::Idle, 1.0)])),
        )
        .with_state(
            StateDefinition::new(StateKind::Shooting)
                .behavior(Behavior::Barrage {
                    projectile: bullet,
                    shots: 3,
                    interval: 0.25,
                    spread: 8.0,
                })
                .lasting(3.0)
                .then(NextState::Fixed(StateKind::Idle)),
        )
        .with_state(
            StateDefinition::new(StateKind::BeingHit)
                .behavior(Behavior::Flinch { knockback_scale: 0.5 })
                .lasting(0.3)
                .then(NextState::Fixed(StateKind::Idle)),
        )
        .with_state(
            StateDefinition::new(StateKind::Dead)
                .behavior(Behavior::Dying {
                    burst_interval: 0.15,
                    style: ParticleStyle::Sparks,
                })
                .lasting(0.6),
        )
        .with_damage(DamageProfile::new(Category::Weapon, 20.0).with_knockback(4.0, 2.0))
        .with_damage(DamageProfile::new(Category::Projectile, 10.0))
        .with_invulnerability(0.3)
        .with_score(25)
}

/// Босс: smash, clap, залпы, призыв рук; без BeingHit (super armor)
pub fn clap_boss() -> ActorDefinition {
    let bullet = ProjectileSpec {
        prefab: "boss_bullet".to_string(),
        speed: 10.0,
        lifetime: 2.5,
        damage: 15.0,
        sound: Some("boss_shot".to_string()),
    };

    ActorDefinition::new(CLAP_BOSS, CLAP_BOSS, 500.0, StateKind::Spawning)
        .with_body(BodySetup::floating())
        .with_state(
            StateDefinition::new(StateKind::Spawning)
                .lasting(2.0)
                .then(NextState::Fixed(StateKind::Idle))
                .enter_cue(CueSpec::sound("boss_roar"))
                .enter_cue(CueSpec::shake(0.8, 1.5)),
        )
        .with_state(
            StateDefinition::new(StateKind::Idle)
                .behavior(Behavior::Hover {
                    height: 4.0,
                    speed: 3.0,
                })
                .lasting(1.2)
                .jitter(0.8)
                .then(NextState::Weighted(vec![
                    (StateKind::Smash, 3.0),
                    (StateKind::Clap, 2.0),
                    (StateKind::Shooting, 2.0),
                    (StateKind::SummonEnemies, 1.0),
                ])),
        )
        .with_state(
            StateDefinition::new(StateKind::Smash)
                .behavior(Behavior::Slam {
                    speed: 18.0,
                    shake: 1.0,
                })
                .lasting(2.5)
                .then(NextState::Fixed(StateKind::Recovering)),
        )
        .with_state(
            StateDefinition::new(StateKind::Clap)
                .behavior(Behavior::Clap {
                    speed: 14.0,
                    shake: 0.7,
                })
                .lasting(2.0)
                .then(NextState::Fixed(StateKind::Recovering))
                .enter_cue(CueSpec::sound("boss_clap_windup")),
        )
        .with_state(
            StateDefinition::new(StateKind::Shooting)
                .behavior(Behavior::Barrage {
                    projectile: bullet,
                    shots: 6,
                    interval: 0.15,
                    spread: 20.0,
                })
                .lasting(3.0)
                .then(NextState::Fixed(StateKind::Recovering)),
        )
        .with_state(
            StateDefinition::new(StateKind::SummonEnemies)
                .behavior(Behavior::Summon {
                    actor_type: HAND_ENEMY.to_string(),
                    count: 2,
                    spacing: 3.0,
                })
                .lasting(1.5)
                .then(NextState::Fixed(StateKind::Recovering))
                .enter_cue(CueSpec::sound("boss_summon")),
        )
        .with_state(
            StateDefinition::new(StateKind::Recovering)
                .lasting(1.0)
                .then(NextState::Fixed(StateKind::Idle)),
        )
        .with_state(
            StateDefinition::new(StateKind::Dead)
                .behavior(Behavior::Dying {
                    burst_interval: 0.15,
                    style: ParticleStyle::Debris,
                })
                .lasting(3.0)
                .enter_cue(CueSpec::shake(1.2, 2.0))
                .enter_cue(CueSpec::sound("boss_death")),
        )
        .with_damage(DamageProfile::new(Category::Projectile, BOSS_HIT_DAMAGE))
        .with_damage(DamageProfile::new(Category::Weapon, BOSS_HIT_DAMAGE))
        .with_invulnerability(0.25)
        .with_phase(
            PhaseRule::below(0.5)
                .forcing(StateKind::SummonEnemies)
                .speed(1.35)
                .cue(CueSpec::sound("boss_enrage")),
        )
        .with_phase(
            PhaseRule::below(0.2)
                .forcing(StateKind::Shooting)
                .speed(1.7)
                .cue(CueSpec::shake(0.6, 0.8)),
        )
        .with_score(1000)
}
