//! Combat module (engine-driven collisions, simulation-side rules)
//!
//! Симуляция отвечает за:
//! - Combat rules: кто кого ранит, сколько, окно неуязвимости
//! - Projectile state: lifetime, fate, пул
//!
//! Движок отвечает за:
//! - Collision detection (overlaps)
//! - Интеграцию тел снарядов

pub mod damage;
pub mod projectile;


pub use damage::{
    apply_damage, AppliedDamage, DamageEvent, DamageProfile, DamageResolver, DamageRules, Victim,
    DEFAULT_INVULNERABILITY,
};
pub use projectile::{
    Projectile, ProjectileFate, ProjectileId, ProjectileOutcome, ProjectileRegistry, ProjectileSpec,
};
