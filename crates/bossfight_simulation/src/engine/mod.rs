//! Engine boundary: узкие capability traits, которые реализует хост-движок
//!
//! ARCHITECTURE:
//! - Simulation: game state, AI decisions, damage rules
//! - Host engine: transforms, physics integration, collision queries, prefabs,
//!   particles/audio/camera
//!
//! Каждый query возвращает `Option`: `None` = движок entity уже не знает
//! (уничтожен), симуляция считает такого актора мёртвым.

use std::fmt;

use bevy::math::Vec2;
use serde::Deserialize;

pub mod headless;

pub use crate::effects::EffectEmitter;
pub use headless::{HeadlessBody, HeadlessEngine};

/// Непрозрачный handle entity движка (instance id на стороне хоста)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Collision categories (tags / layers движка)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Category {
    Player,
    Weapon,
    Projectile,
    Hazard,
    Ground,
    Wall,
    Enemy,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Player,
        Category::Weapon,
        Category::Projectile,
        Category::Hazard,
        Category::Ground,
        Category::Wall,
        Category::Enemy,
    ];

    /// Terrain: останавливает снаряды
    pub fn is_solid(self) -> bool {
        matches!(self, Category::Ground | Category::Wall)
    }
}

/// Режим rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BodyType {
    #[default]
    Dynamic,
    Kinematic,
    Static,
}

pub trait TransformService {
    fn position(&self, entity: EntityHandle) -> Option<Vec2>;
    fn set_position(&mut self, entity: EntityHandle, position: Vec2);
    fn scale(&self, entity: EntityHandle) -> Option<Vec2>;
    fn set_scale(&mut self, entity: EntityHandle, scale: Vec2);
    fn rotation(&self, entity: EntityHandle) -> Option<f32>;
    fn set_rotation(&mut self, entity: EntityHandle, radians: f32);
}

pub trait PhysicsService {
    /// Entities, пересекающиеся с `entity` (порядок движка)
    fn overlapping(&self, entity: EntityHandle) -> Option<Vec<EntityHandle>>;
    fn velocity(&self, entity: EntityHandle) -> Option<Vec2>;
    fn set_velocity(&mut self, entity: EntityHandle, velocity: Vec2);
    fn set_gravity_scale(&mut self, entity: EntityHandle, scale: f32);
    fn set_body_type(&mut self, entity: EntityHandle, body: BodyType);

    /// Шаг интеграции для хостов без собственного physics loop
    fn integrate(&mut self, _dt: f32) {}
}

pub trait CategoryService {
    fn has_category(&self, entity: EntityHandle, category: Category) -> bool;
}

pub trait LifecycleService {
    fn instantiate(&mut self, prefab: &str, position: Vec2) -> Option<EntityHandle>;
    fn destroy(&mut self, entity: EntityHandle);
    fn clone_entity(&mut self, entity: EntityHandle) -> Option<EntityHandle>;
    fn exists(&self, entity: EntityHandle) -> bool;
}

pub trait TimeService {
    /// Delta кадра (секунды)
    fn delta_time(&self) -> f32;
}

pub trait RandomService {
    /// Равномерный float в [0, 1); только для seed'а `RandomStream`
    fn random_float(&mut self) -> f32;
}

/// Всё, что симуляции нужно от хоста, одним объектом
pub trait EngineBridge:
    TransformService
    + PhysicsService
    + CategoryService
    + LifecycleService
    + TimeService
    + RandomService
    + EffectEmitter
{
}

impl<T> EngineBridge for T where
    T: TransformService
        + PhysicsService
        + CategoryService
        + LifecycleService
        + TimeService
        + RandomService
        + EffectEmitter
{
}

/// Пересекающийся entity + данные для DamageResolver
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub entity: EntityHandle,
    pub position: Option<Vec2>,
    pub categories: Vec<Category>,
}

impl Contact {
    pub fn has(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Categories + position одного пересекающегося entity
pub fn probe_contact<E>(engine: &E, entity: EntityHandle) -> Contact
where
    E: TransformService + CategoryService + ?Sized,
{
    let categories = Category::ALL
        .iter()
        .copied()
        .filter(|category| engine.has_category(entity, *category))
        .collect();

    Contact {
        entity,
        position: engine.position(entity),
        categories,
    }
}

/// Contacts for everything overlapping `entity` (`None` → entity is gone)
pub fn probe_overlaps<E>(engine: &E, entity: EntityHandle) -> Option<Vec<Contact>>
where
    E: TransformService + PhysicsService + CategoryService + ?Sized,
{
    let overlaps = engine.overlapping(entity)?;
    Some(
        overlaps
            .into_iter()
            .filter(|other| *other != entity)
            .map(|other| probe_contact(engine, other))
            .collect(),
    )
}
