//! HeadlessEngine: in-memory хост без рендера
//!
//! Используется headless binary и тестами вместо настоящего движка.
//! Физика: простой Euler (gravity × gravity_scale для Dynamic тел),
//! overlaps задаются сценарием вручную (add_overlap / set_overlaps).
//! Эффекты не рисуются, а записываются для проверки.

use std::collections::BTreeMap;

use bevy::math::Vec2;

use super::{
    BodyType, Category, CategoryService, EntityHandle, LifecycleService, PhysicsService, RandomService,
    TimeService, TransformService,
};
use crate::effects::{EffectCue, EffectEmitter, ParticleBurst};
use crate::rng::RandomStream;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessBody {
    pub prefab: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub gravity_scale: f32,
    pub body_type: BodyType,
    pub categories: Vec<Category>,
}

impl HeadlessBody {
    fn new(prefab: &str, position: Vec2, categories: Vec<Category>) -> Self {
        Self {
            prefab: prefab.to_string(),
            position,
            velocity: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            gravity_scale: 1.0,
            body_type: BodyType::Dynamic,
            categories,
        }
    }
}

#[derive(Debug)]
pub struct HeadlessEngine {
    bodies: BTreeMap<EntityHandle, HeadlessBody>,
    overlaps: BTreeMap<EntityHandle, Vec<EntityHandle>>,
    prefabs: BTreeMap<String, Vec<Category>>,
    /// Неизвестный prefab → instantiate возвращает None
    strict: bool,
    next_handle: u64,
    gravity: Vec2,
    /// Пол (y), ниже которого Dynamic тела не проваливаются
    floor: Option<f32>,
    delta: f32,
    rng: RandomStream,
    effects: Vec<EffectCue>,
    destroyed: Vec<EntityHandle>,
}

impl HeadlessEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            bodies: BTreeMap::new(),
            overlaps: BTreeMap::new(),
            prefabs: BTreeMap::new(),
            strict: false,
            next_handle: 1,
            gravity: Vec2::ZERO,
            floor: None,
            delta: 1.0 / 60.0,
            rng: RandomStream::new(seed),
            effects: Vec::new(),
            destroyed: Vec::new(),
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_delta(mut self, delta: f32) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2, floor: Option<f32>) -> Self {
        self.gravity = gravity;
        self.floor = floor;
        self
    }

    pub fn with_prefabs<'a>(mut self, prefabs: impl IntoIterator<Item = &'a (&'a str, Category)>) -> Self {
        for (name, category) in prefabs {
            self.register_prefab(name, vec![*category]);
        }
        self
    }

    pub fn register_prefab(&mut self, name: &str, categories: Vec<Category>) {
        self.prefabs.insert(name.to_string(), categories);
    }

    /// Тело вне prefab таблицы (игрок, меч, пуля игрока, стена)
    pub fn spawn_body(&mut self, categories: &[Category], position: Vec2) -> EntityHandle {
        let handle = self.allocate();
        let mut body = HeadlessBody::new("scripted", position, categories.to_vec());
        body.body_type = BodyType::Kinematic;
        body.gravity_scale = 0.0;
        self.bodies.insert(handle, body);
        handle
    }

    pub fn body(&self, entity: EntityHandle) -> Option<&HeadlessBody> {
        self.bodies.get(&entity)
    }

    pub fn body_mut(&mut self, entity: EntityHandle) -> Option<&mut HeadlessBody> {
        self.bodies.get_mut(&entity)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Симметричный overlap a ↔ b (повторное добавление игнорируется)
    pub fn add_overlap(&mut self, a: EntityHandle, b: EntityHandle) {
        if a == b {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            let list = self.overlaps.entry(from).or_default();
            if !list.contains(&to) {
                list.push(to);
            }
        }
    }

    pub fn remove_overlap(&mut self, a: EntityHandle, b: EntityHandle) {
        if let Some(list) = self.overlaps.get_mut(&a) {
            list.retain(|other| *other != b);
        }
        if let Some(list) = self.overlaps.get_mut(&b) {
            list.retain(|other| *other != a);
        }
    }

    /// Заменить overlaps `entity` (порядок сохраняется, обратные связи не трогаем)
    pub fn set_overlaps(&mut self, entity: EntityHandle, others: Vec<EntityHandle>) {
        self.overlaps.insert(entity, others);
    }

    pub fn clear_overlaps(&mut self, entity: EntityHandle) {
        let others = self.overlaps.remove(&entity).unwrap_or_default();
        for other in others {
            if let Some(list) = self.overlaps.get_mut(&other) {
                list.retain(|e| *e != entity);
            }
        }
    }

    /// Движок удалил entity сам (вне симуляции)
    pub fn remove_externally(&mut self, entity: EntityHandle) {
        self.bodies.remove(&entity);
        self.clear_overlaps(entity);
    }

    /// Интегрировать все тела на `dt`
    pub fn step(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            match body.body_type {
                BodyType::Static => continue,
                BodyType::Dynamic => {
                    body.velocity += self.gravity * body.gravity_scale * dt;
                }
                BodyType::Kinematic => {}
            }
            body.position += body.velocity * dt;

            if let (BodyType::Dynamic, Some(floor)) = (body.body_type, self.floor) {
                if body.position.y < floor {
                    body.position.y = floor;
                    body.velocity.y = 0.0;
                }
            }
        }
    }

    pub fn effects(&self) -> &[EffectCue] {
        &self.effects
    }

    pub fn take_effects(&mut self) -> Vec<EffectCue> {
        std::mem::take(&mut self.effects)
    }

    /// Entities, уничтоженные через LifecycleService::destroy (в порядке вызова)
    pub fn destroyed(&self) -> &[EntityHandle] {
        &self.destroyed
    }

    fn allocate(&mut self) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl TransformService for HeadlessEngine {
    fn position(&self, entity: EntityHandle) -> Option<Vec2> {
        self.bodies.get(&entity).map(|body| body.position)
    }

    fn set_position(&mut self, entity: EntityHandle, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.position = position;
        }
    }

    fn scale(&self, entity: EntityHandle) -> Option<Vec2> {
        self.bodies.get(&entity).map(|body| body.scale)
    }

    fn set_scale(&mut self, entity: EntityHandle, scale: Vec2) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.scale = scale;
        }
    }

    fn rotation(&self, entity: EntityHandle) -> Option<f32> {
        self.bodies.get(&entity).map(|body| body.rotation)
    }

    fn set_rotation(&mut self, entity: EntityHandle, radians: f32) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.rotation = radians;
        }
    }
}

impl PhysicsService for HeadlessEngine {
    fn overlapping(&self, entity: EntityHandle) -> Option<Vec<EntityHandle>> {
        if !self.bodies.contains_key(&entity) {
            return None;
        }
        let others = self
            .overlaps
            .get(&entity)
            .map(|list| {
                list.iter()
                    .copied()
                    .filter(|other| self.bodies.contains_key(other))
                    .collect()
            })
            .unwrap_or_default();
        Some(others)
    }

    fn velocity(&self, entity: EntityHandle) -> Option<Vec2> {
        self.bodies.get(&entity).map(|body| body.velocity)
    }

    fn set_velocity(&mut self, entity: EntityHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.velocity = velocity;
        }
    }

    fn set_gravity_scale(&mut self, entity: EntityHandle, scale: f32) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.gravity_scale = scale;
        }
    }

    fn set_body_type(&mut self, entity: EntityHandle, body_type: BodyType) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.body_type = body_type;
        }
    }

    fn integrate(&mut self, dt: f32) {
        self.step(dt);
    }
}

impl CategoryService for HeadlessEngine {
    fn has_category(&self, entity: EntityHandle, category: Category) -> bool {
        self.bodies
            .get(&entity)
            .is_some_and(|body| body.categories.contains(&category))
    }
}

impl LifecycleService for HeadlessEngine {
    fn instantiate(&mut self, prefab: &str, position: Vec2) -> Option<EntityHandle> {
        let categories = match self.prefabs.get(prefab) {
            Some(categories) => categories.clone(),
            None if self.strict => return None,
            None => Vec::new(),
        };

        let handle = self.allocate();
        self.bodies.insert(handle, HeadlessBody::new(prefab, position, categories));
        Some(handle)
    }

    fn destroy(&mut self, entity: EntityHandle) {
        if self.bodies.remove(&entity).is_some() {
            self.clear_overlaps(entity);
            self.destroyed.push(entity);
        }
    }

    fn clone_entity(&mut self, entity: EntityHandle) -> Option<EntityHandle> {
        let body = self.bodies.get(&entity)?.clone();
        let handle = self.allocate();
        self.bodies.insert(handle, body);
        Some(handle)
    }

    fn exists(&self, entity: EntityHandle) -> bool {
        self.bodies.contains_key(&entity)
    }
}

impl TimeService for HeadlessEngine {
    fn delta_time(&self) -> f32 {
        self.delta
    }
}

impl RandomService for HeadlessEngine {
    fn random_float(&mut self) -> f32 {
        self.rng.next_float()
    }
}

impl EffectEmitter for HeadlessEngine {
    fn spawn_particle_burst(&mut self, burst: &ParticleBurst) {
        self.effects.push(EffectCue::Particles(burst.clone()));
    }

    fn play_sound(&mut self, clip: &str, volume: f32) {
        self.effects.push(EffectCue::sound(clip, volume));
    }

    fn shake_camera(&mut self, intensity: f32, duration: f32) {
        self.effects.push(EffectCue::shake(intensity, duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::probe_overlaps;

    #[test]
    fn test_strict_mode_rejects_unknown_prefab() {
        let mut engine = HeadlessEngine::new(1).strict();
        engine.register_prefab("grunt", vec![Category::Enemy]);

        assert!(engine.instantiate("grunt", Vec2::ZERO).is_some());
        assert!(engine.instantiate("missing", Vec2::ZERO).is_none());
    }

    #[test]
    fn test_overlaps_are_symmetric_and_drop_destroyed() {
        let mut engine = HeadlessEngine::new(1);
        let a = engine.spawn_body(&[Category::Enemy], Vec2::ZERO);
        let b = engine.spawn_body(&[Category::Weapon], Vec2::X);

        engine.add_overlap(a, b);
        assert_eq!(engine.overlapping(a), Some(vec![b]));
        assert_eq!(engine.overlapping(b), Some(vec![a]));

        let contacts = probe_overlaps(&engine, a).unwrap();
        assert_eq!(contacts.len(), 1);
        assert!(contacts[0].has(Category::Weapon));
        assert_eq!(contacts[0].position, Some(Vec2::X));

        engine.destroy(b);
        assert_eq!(engine.overlapping(a), Some(vec![]));
        assert_eq!(engine.overlapping(b), None);
        assert_eq!(engine.destroyed(), &[b]);
    }

    #[test]
    fn test_step_integrates_dynamic_bodies() {
        let mut engine = HeadlessEngine::new(1).with_gravity(Vec2::new(0.0, -10.0), Some(0.0));
        engine.register_prefab("crate", vec![]);
        let handle = engine.instantiate("crate", Vec2::new(0.0, 1.0)).unwrap();
        engine.set_velocity(handle, Vec2::new(2.0, 0.0));

        engine.step(0.5);
        let body = engine.body(handle).unwrap();
        assert_eq!(body.position.x, 1.0);
        // Упали на пол
        assert_eq!(body.position.y, 0.0);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_effects_recorded() {
        let mut engine = HeadlessEngine::new(1);
        engine.play_sound("roar", 0.8);
        engine.shake_camera(0.5, 1.0);

        assert_eq!(engine.effects().len(), 2);
        assert_eq!(engine.take_effects().len(), 2);
        assert!(engine.effects().is_empty());
    }
}
