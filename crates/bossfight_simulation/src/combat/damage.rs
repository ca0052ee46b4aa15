//! DamageResolver: overlaps → максимум один DamageEvent на актора за тик
//!
//! Алгоритм:
//! 1. Invulnerability таймер жертвы ещё идёт → ничего
//! 2. Первый contact (порядок overlaps движка), у которого есть категория из
//!    DamageProfile, выигрывает. Внутри одного contact'а порядок профилей решает.
//! 3. Invulnerability сбрасывается на cooldown прямо в resolve, поэтому
//!    второй атакующий в том же тике уже ничего не наносит.
//!
//! Здоровье меняет вызывающий (`apply_damage`), resolver только решает.

use bevy::math::Vec2;
use serde::Deserialize;

use crate::actor::{ActorId, Health};
use crate::engine::{Category, Contact, EntityHandle};
use crate::timer::Countdown;

/// Окно неуязвимости по умолчанию (секунды)
pub const DEFAULT_INVULNERABILITY: f32 = 0.5;

fn default_invulnerability() -> f32 {
    DEFAULT_INVULNERABILITY
}

/// Урон от одной категории атакующих
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DamageProfile {
    pub category: Category,
    pub amount: f32,
    /// (horizontal, vertical); horizontal направлен от атакующего
    #[serde(default)]
    pub knockback: (f32, f32),
}

impl DamageProfile {
    pub fn new(category: Category, amount: f32) -> Self {
        Self {
            category,
            amount,
            knockback: (0.0, 0.0),
        }
    }

    pub fn with_knockback(mut self, horizontal: f32, vertical: f32) -> Self {
        self.knockback = (horizontal, vertical);
        self
    }
}

/// Что и сколько ранит актора данного типа
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DamageRules {
    #[serde(default)]
    pub profiles: Vec<DamageProfile>,
    #[serde(default = "default_invulnerability")]
    pub invulnerability: f32,
}

impl Default for DamageRules {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            invulnerability: DEFAULT_INVULNERABILITY,
        }
    }
}

/// Эфемерный результат resolve (сразу потребляется жертвой)
#[derive(Debug, Clone, PartialEq)]
pub struct DamageEvent {
    pub attacker: EntityHandle,
    pub victim: ActorId,
    pub category: Category,
    pub amount: f32,
    pub knockback: Vec2,
}

/// Данные жертвы, нужные resolver'у
pub struct Victim<'a> {
    pub id: ActorId,
    pub position: Vec2,
    pub invulnerability: &'a mut Countdown,
}

pub struct DamageResolver<'a> {
    rules: &'a DamageRules,
}

impl<'a> DamageResolver<'a> {
    pub fn new(rules: &'a DamageRules) -> Self {
        Self { rules }
    }

    pub fn resolve(&self, victim: Victim<'_>, contacts: &[Contact]) -> Option<DamageEvent> {
        if victim.invulnerability.is_running() {
            return None;
        }

        let (contact, profile) = contacts.iter().find_map(|contact| {
            self.rules
                .profiles
                .iter()
                .find(|profile| contact.has(profile.category))
                .map(|profile| (contact, profile))
        })?;

        victim.invulnerability.set(self.rules.invulnerability);

        Some(DamageEvent {
            attacker: contact.entity,
            victim: victim.id,
            category: profile.category,
            amount: profile.amount,
            knockback: knockback_away(profile.knockback, contact.position, victim.position),
        })
    }
}

/// Horizontal knockback от атакующего; позиция атакующего неизвестна → только vertical
fn knockback_away(knockback: (f32, f32), attacker: Option<Vec2>, victim: Vec2) -> Vec2 {
    let direction = match attacker {
        Some(attacker) if attacker.x > victim.x => -1.0,
        Some(_) => 1.0,
        None => 0.0,
    };
    Vec2::new(knockback.0 * direction, knockback.1)
}

/// Как урон лёг на здоровье
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppliedDamage {
    /// Жертва уже мертва или урон нулевой
    Absorbed,
    Direct(f32),
    /// Этот удар убил
    Lethal(f32),
}

impl AppliedDamage {
    pub fn amount(&self) -> f32 {
        match self {
            AppliedDamage::Absorbed => 0.0,
            AppliedDamage::Direct(amount) | AppliedDamage::Lethal(amount) => *amount,
        }
    }

    pub fn is_lethal(&self) -> bool {
        matches!(self, AppliedDamage::Lethal(_))
    }
}

pub fn apply_damage(health: &mut Health, event: &DamageEvent) -> AppliedDamage {
    if !health.is_alive() {
        return AppliedDamage::Absorbed;
    }

    let applied = health.take_damage(event.amount);
    if applied <= 0.0 {
        AppliedDamage::Absorbed
    } else if health.is_alive() {
        AppliedDamage::Direct(applied)
    } else {
        AppliedDamage::Lethal(applied)
    }
}
