//! Actor domain: враждебные акторы encounter'а
//!
//! Содержит:
//! - ActorId (стабильный id, не переиспользуется внутри encounter'а)
//! - Health (здоровье, f32, clamp в [0, max])
//! - Facing (знак горизонтального scale)
//! - Kinematics (position/velocity, зеркалятся из физики каждый тик)
//! - Actor (всё вместе + state machine + invulnerability + свой RandomStream)

use std::fmt;
use std::sync::Arc;

use bevy::math::Vec2;

use crate::ai::{ActorDefinition, StateKind, StateMachine};
use crate::combat::{DamageEvent, Victim};
use crate::encounter::DeathCause;
use crate::engine::EntityHandle;
use crate::rng::RandomStream;
use crate::timer::Countdown;

/// Урон дробными долями (max/12) накапливает ошибку f32: остаток ниже
/// `max * HEALTH_SNAP_FRACTION` = 0
const HEALTH_SNAP_FRACTION: f32 = 1e-5;

/// Id актора внутри одного encounter'а (монотонный)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        let max = if max.is_finite() { max.max(0.0) } else { 0.0 };
        Self { current: max, max }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// current / max (0.0 для вырожденного max)
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Применить урон, вернуть сколько реально снято
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }

        let before = self.current;
        self.current = (self.current - amount).max(0.0);
        if self.current <= self.max * HEALTH_SNAP_FRACTION {
            self.current = 0.0;
        }
        before - self.current
    }

    pub fn heal(&mut self, amount: f32) {
        if amount.is_finite() && amount > 0.0 {
            self.current = (self.current + amount).min(self.max);
        }
    }

    pub fn kill(&mut self) {
        self.current = 0.0;
    }
}

/// Направление взгляда (знак горизонтального scale)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }

    /// Повернуться по знаку `dx` (0 → без изменений)
    pub fn toward(self, dx: f32) -> Self {
        if dx > 0.0 {
            Facing::Right
        } else if dx < 0.0 {
            Facing::Left
        } else {
            self
        }
    }

    pub fn from_scale_x(x: f32) -> Self {
        if x < 0.0 {
            Facing::Left
        } else {
            Facing::Right
        }
    }
}

/// Position/velocity: владелец физика движка; здесь локальное зеркало
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Живой актор в roster'е encounter'а
#[derive(Debug)]
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) handle: EntityHandle,
    pub(crate) definition: Arc<ActorDefinition>,
    pub(crate) health: Health,
    pub(crate) kinematics: Kinematics,
    pub(crate) facing: Facing,
    pub(crate) machine: StateMachine,
    pub(crate) invulnerability: Countdown,
    pub(crate) rng: RandomStream,
    /// Последний применённый удар (для flinch/knockback)
    pub(crate) last_hit: Option<DamageEvent>,
    /// Сколько фаз (health thresholds) уже пройдено
    pub(crate) phase: usize,
    pub(crate) speed_scale: f32,
    pub(crate) killer: Option<EntityHandle>,
    /// Помечен на удаление в конце тика
    pub(crate) removal: Option<DeathCause>,
}

impl Actor {
    pub(crate) fn new(
        id: ActorId,
        handle: EntityHandle,
        definition: Arc<ActorDefinition>,
        position: Vec2,
        rng: RandomStream,
    ) -> Self {
        let health = Health::new(definition.max_health);
        let machine = StateMachine::new(definition.initial_state);

        Self {
            id,
            handle,
            definition,
            health,
            kinematics: Kinematics {
                position,
                velocity: Vec2::ZERO,
            },
            facing: Facing::default(),
            machine,
            invulnerability: Countdown::default(),
            rng,
            last_hit: None,
            phase: 0,
            speed_scale: 1.0,
            killer: None,
            removal: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn type_name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ActorDefinition {
        &self.definition
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn position(&self) -> Vec2 {
        self.kinematics.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.kinematics.velocity
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn state(&self) -> StateKind {
        self.machine.current()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn invulnerability(&self) -> &Countdown {
        &self.invulnerability
    }

    pub fn last_hit(&self) -> Option<&DamageEvent> {
        self.last_hit.as_ref()
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn speed_scale(&self) -> f32 {
        self.speed_scale
    }

    pub fn rng(&self) -> &RandomStream {
        &self.rng
    }

    /// Жив и не в Dead (мёртвые досматривают death animation)
    pub fn is_alive(&self) -> bool {
        self.health.is_alive() && self.machine.current() != StateKind::Dead && self.removal.is_none()
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.removal.is_some()
    }

    pub(crate) fn as_victim(&mut self) -> Victim<'_> {
        Victim {
            id: self.id,
            position: self.kinematics.position,
            invulnerability: &mut self.invulnerability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_clamped_at_zero() {
        let mut health = Health::new(100.0);

        assert_eq!(health.take_damage(60.0), 60.0);
        assert_eq!(health.take_damage(60.0), 40.0);
        assert_eq!(health.current(), 0.0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_twelve_fractional_hits_kill() {
        let mut health = Health::new(500.0);
        let hit = 500.0 / 12.0;

        for _ in 0..11 {
            health.take_damage(hit);
            assert!(health.is_alive());
        }

        health.take_damage(hit);
        assert_eq!(health.current(), 0.0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_tiny_max_health_survives_partial_hit() {
        let mut health = Health::new(5e-4);

        assert!((health.take_damage(2e-4) - 2e-4).abs() < 1e-9);
        assert!(health.is_alive());
        assert!((health.current() - 3e-4).abs() < 1e-9);

        health.take_damage(3e-4);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_invalid_damage_ignored() {
        let mut health = Health::new(50.0);
        assert_eq!(health.take_damage(-10.0), 0.0);
        assert_eq!(health.take_damage(f32::NAN), 0.0);
        assert_eq!(health.current(), 50.0);
    }

    #[test]
    fn test_heal_capped_at_max() {
        let mut health = Health::new(80.0);
        health.take_damage(30.0);
        health.heal(100.0);
        assert_eq!(health.current(), 80.0);
        assert_eq!(health.fraction(), 1.0);
    }

    #[test]
    fn test_facing_toward() {
        assert_eq!(Facing::Right.toward(-0.5), Facing::Left);
        assert_eq!(Facing::Left.toward(2.0), Facing::Right);
        assert_eq!(Facing::Left.toward(0.0), Facing::Left);
        assert_eq!(Facing::Left.flipped().sign(), 1.0);
        assert_eq!(Facing::from_scale_x(-2.0), Facing::Left);
    }
}
