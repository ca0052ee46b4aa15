//! ProjectileRegistry: снаряды encounter'а (пули hand enemy, залпы босса)
//!
//! # Architecture
//! - Registry владеет состоянием снаряда (направление, скорость, lifetime)
//! - Движок владеет телом (kinematic, gravity 0) и collision queries
//! - Удаление отложено: tick только помечает, reap в конце тика уничтожает
//!   engine entity (никаких destroy посреди итерации)
//! - Пул ограничен: полный registry → новый выстрел отбрасывается

use std::collections::{BTreeMap, BTreeSet};

use bevy::math::Vec2;
use serde::Deserialize;

use crate::actor::ActorId;
use crate::engine::{probe_overlaps, BodyType, Category, EngineBridge, EntityHandle};
use crate::timer::Countdown;

/// Параметры выстрела (конфиг Barrage behavior)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectileSpec {
    pub prefab: String,
    pub speed: f32,
    pub lifetime: f32,
    pub damage: f32,
    /// Звук выстрела
    #[serde(default)]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectileId(pub u64);

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub handle: EntityHandle,
    pub owner: ActorId,
    pub direction: Vec2,
    pub speed: f32,
    pub damage: f32,
    pub lifetime: Countdown,
    pub alive: bool,
    pub fate: Option<ProjectileFate>,
}

/// Почему снаряд перестал существовать
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileFate {
    Expired,
    /// Terrain или чужой снаряд
    Blocked { by: EntityHandle },
    /// Попал в Player
    HitTarget { target: EntityHandle },
    /// Движок удалил entity сам
    Vanished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileOutcome {
    pub id: ProjectileId,
    pub owner: ActorId,
    pub handle: EntityHandle,
    pub position: Option<Vec2>,
    pub damage: f32,
    pub fate: ProjectileFate,
}

#[derive(Debug)]
pub struct ProjectileRegistry {
    projectiles: BTreeMap<ProjectileId, Projectile>,
    next_id: u64,
    capacity: usize,
    dropped: u64,
}

impl ProjectileRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            projectiles: BTreeMap::new(),
            next_id: 0,
            capacity,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Выстрелы, отброшенные из-за полного пула или отказа движка
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    /// Engine handles всех снарядов (свои пули не ранят своих акторов)
    pub fn handles(&self) -> BTreeSet<EntityHandle> {
        self.projectiles.values().map(|p| p.handle).collect()
    }

    pub fn contains_handle(&self, handle: EntityHandle) -> bool {
        self.projectiles.values().any(|p| p.handle == handle)
    }

    /// Создать снаряд; `None` если пул полон или движок не смог instantiate
    pub fn fire(
        &mut self,
        engine: &mut dyn EngineBridge,
        owner: ActorId,
        spec: &ProjectileSpec,
        origin: Vec2,
        direction: Vec2,
    ) -> Option<ProjectileId> {
        if self.projectiles.len() >= self.capacity {
            self.dropped += 1;
            crate::log_warning(&format!(
                "🔫 Projectile pool full ({}), dropping `{}` from {}",
                self.capacity, spec.prefab, owner
            ));
            return None;
        }

        let Some(handle) = engine.instantiate(&spec.prefab, origin) else {
            self.dropped += 1;
            crate::log_warning(&format!("🔫 Engine refused projectile prefab `{}`", spec.prefab));
            return None;
        };

        let direction = direction.try_normalize().unwrap_or(Vec2::X);
        engine.set_body_type(handle, BodyType::Kinematic);
        engine.set_gravity_scale(handle, 0.0);
        engine.set_velocity(handle, direction * spec.speed);
        engine.set_rotation(handle, direction.y.atan2(direction.x));

        let id = ProjectileId(self.next_id);
        self.next_id += 1;

        self.projectiles.insert(
            id,
            Projectile {
                id,
                handle,
                owner,
                direction,
                speed: spec.speed,
                damage: spec.damage,
                lifetime: Countdown::new(spec.lifetime),
                alive: true,
                fate: None,
            },
        );

        Some(id)
    }

    /// Продвинуть все живые снаряды на `dt`, вернуть погибшие в этом тике
    pub fn tick(&mut self, engine: &mut dyn EngineBridge, dt: f32) -> Vec<ProjectileOutcome> {
        let own_handles = self.handles();
        let mut outcomes = Vec::new();

        for projectile in self.projectiles.values_mut().filter(|p| p.alive) {
            let position = engine.position(projectile.handle);
            let fate = if position.is_none() || !engine.exists(projectile.handle) {
                Some(ProjectileFate::Vanished)
            } else {
                projectile.lifetime.tick(dt);
                if projectile.lifetime.expired() {
                    Some(ProjectileFate::Expired)
                } else {
                    collision_fate(engine, projectile.handle, &own_handles)
                }
            };

            let Some(fate) = fate else {
                engine.set_velocity(projectile.handle, projectile.direction * projectile.speed);
                continue;
            };

            projectile.alive = false;
            projectile.fate = Some(fate);
            outcomes.push(ProjectileOutcome {
                id: projectile.id,
                owner: projectile.owner,
                handle: projectile.handle,
                position,
                damage: projectile.damage,
                fate,
            });
        }

        outcomes
    }

    /// Удалить мёртвые снаряды и их engine entities
    pub fn reap(&mut self, engine: &mut dyn EngineBridge) -> Vec<ProjectileId> {
        let dead: Vec<ProjectileId> = self
            .projectiles
            .values()
            .filter(|p| !p.alive)
            .map(|p| p.id)
            .collect();

        for id in &dead {
            if let Some(projectile) = self.projectiles.remove(id) {
                if engine.exists(projectile.handle) {
                    engine.destroy(projectile.handle);
                }
            }
        }

        dead
    }

    /// Уничтожить все снаряды (конец encounter'а)
    pub fn clear(&mut self, engine: &mut dyn EngineBridge) {
        for projectile in std::mem::take(&mut self.projectiles).into_values() {
            if engine.exists(projectile.handle) {
                engine.destroy(projectile.handle);
            }
        }
    }
}

/// Player → попадание; terrain или чужой снаряд → blocked
fn collision_fate(
    engine: &dyn EngineBridge,
    handle: EntityHandle,
    own_handles: &BTreeSet<EntityHandle>,
) -> Option<ProjectileFate> {
    let contacts = probe_overlaps(engine, handle)?;

    contacts
        .iter()
        .filter(|contact| !own_handles.contains(&contact.entity))
        .find_map(|contact| {
            if contact.has(Category::Player) {
                Some(ProjectileFate::HitTarget {
                    target: contact.entity,
                })
            } else if contact.categories.iter().any(|c| c.is_solid()) || contact.has(Category::Projectile) {
                Some(ProjectileFate::Blocked { by: contact.entity })
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{HeadlessEngine, LifecycleService};

    fn bullet(lifetime: f32) -> ProjectileSpec {
        ProjectileSpec {
            prefab: "hand_bullet".to_string(),
            speed: 8.0,
            lifetime,
            damage: 10.0,
            sound: None,
        }
    }

    fn engine() -> HeadlessEngine {
        let mut engine = HeadlessEngine::new(3).strict();
        engine.register_prefab("hand_bullet", vec![Category::Projectile]);
        engine
    }

    #[test]
    fn test_lifetime_expires_by_frame_120() {
        let mut engine = engine();
        let mut registry = ProjectileRegistry::new(8);
        let id = registry
            .fire(&mut engine, ActorId(0), &bullet(2.0), Vec2::ZERO, Vec2::X)
            .unwrap();

        let dt = 1.0 / 60.0;
        let mut expired_on = None;
        for frame in 1..=121 {
            let outcomes = registry.tick(&mut engine, dt);
            if outcomes.iter().any(|o| o.id == id && o.fate == ProjectileFate::Expired) {
                expired_on = Some(frame);
            }
            registry.reap(&mut engine);
        }

        let frame = expired_on.unwrap();
        assert!(frame <= 120, "expired on frame {}", frame);
        assert!(registry.is_empty());
        assert_eq!(engine.body_count(), 0);
    }

    #[test]
    fn test_pool_full_drops_newest() {
        let mut engine = engine();
        let mut registry = ProjectileRegistry::new(2);

        assert!(registry.fire(&mut engine, ActorId(0), &bullet(1.0), Vec2::ZERO, Vec2::X).is_some());
        assert!(registry.fire(&mut engine, ActorId(0), &bullet(1.0), Vec2::ZERO, Vec2::X).is_some());
        assert!(registry.fire(&mut engine, ActorId(0), &bullet(1.0), Vec2::ZERO, Vec2::X).is_none());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.dropped(), 1);
    }

    #[test]
    fn test_fire_sets_up_kinematic_body() {
        let mut engine = engine();
        let mut registry = ProjectileRegistry::new(4);
        let id = registry
            .fire(&mut engine, ActorId(1), &bullet(1.0), Vec2::ZERO, Vec2::new(0.0, 3.0))
            .unwrap();

        let handle = registry.get(id).unwrap().handle;
        let body = engine.body(handle).unwrap();
        assert_eq!(body.body_type, BodyType::Kinematic);
        assert_eq!(body.gravity_scale, 0.0);
        assert_eq!(body.velocity, Vec2::new(0.0, 8.0));
    }

    #[test]
    fn test_hits_player_and_blocks_on_wall() {
        let mut engine = engine();
        let mut registry = ProjectileRegistry::new(4);
        let player = engine.spawn_body(&[Category::Player], Vec2::new(1.0, 0.0));
        let wall = engine.spawn_body(&[Category::Wall], Vec2::new(-1.0, 0.0));

        let a = registry.fire(&mut engine, ActorId(0), &bullet(5.0), Vec2::ZERO, Vec2::X).unwrap();
        let b = registry.fire(&mut engine, ActorId(0), &bullet(5.0), Vec2::ZERO, -Vec2::X).unwrap();
        let handle_a = registry.get(a).unwrap().handle;
        let handle_b = registry.get(b).unwrap().handle;

        engine.add_overlap(handle_a, player);
        engine.add_overlap(handle_b, wall);
        // Свои снаряды друг друга не гасят
        engine.add_overlap(handle_a, handle_b);

        let outcomes = registry.tick(&mut engine, 0.1);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].fate, ProjectileFate::HitTarget { target: player });
        assert_eq!(outcomes[1].fate, ProjectileFate::Blocked { by: wall });

        let reaped = registry.reap(&mut engine);
        assert_eq!(reaped, vec![a, b]);
        assert!(!engine.exists(handle_a));
        assert!(engine.exists(player));
    }

    #[test]
    fn test_vanished_entity_not_destroyed_twice() {
        let mut engine = engine();
        let mut registry = ProjectileRegistry::new(4);
        let id = registry.fire(&mut engine, ActorId(0), &bullet(5.0), Vec2::ZERO, Vec2::X).unwrap();
        let handle = registry.get(id).unwrap().handle;

        engine.remove_externally(handle);
        let outcomes = registry.tick(&mut engine, 0.1);
        assert_eq!(outcomes[0].fate, ProjectileFate::Vanished);

        registry.reap(&mut engine);
        assert!(engine.destroyed().is_empty());
    }
}
