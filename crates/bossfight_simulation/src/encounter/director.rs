//! EncounterDirector: владелец roster'а, снарядов, волн и фаз одного боя
//!
//! # Порядок тика
//! 1. Для каждого актора (в порядке spawn):
//!    mirror position/velocity → invulnerability → overlaps → DamageResolver
//!    → phase thresholds → FSM step → facing/velocity обратно в движок
//! 2. Снаряды: lifetime + collisions
//! 3. Отложенные команды акторов (summon, выстрелы)
//! 4. Волны
//! 5. Effect cues через бюджет
//! 6. Reap: снаряды и акторы, чья death animation доиграла
//!
//! Удаление и spawn по запросам акторов никогда не происходят посреди
//! итерации roster'а.

use std::sync::Arc;

use bevy::math::Vec2;

use super::events::{DeathCause, DeathReport, EncounterEvent};
use super::settings::{EncounterConfig, EncounterSettings};
use super::waves::WaveSchedule;
use crate::actor::{Actor, ActorId, Facing};
use crate::ai::{start_actor, step_actor, ActorCommand, DefinitionRegistry, Signals, StateKind, StepInput, StepOutput};
use crate::combat::{apply_damage, DamageResolver, ProjectileFate, ProjectileRegistry};
use crate::effects::{dispatch, EffectBudget, EffectCue, ParticleBurst, ParticleStyle};
use crate::engine::{probe_overlaps, Category, Contact, EngineBridge, EntityHandle};
use crate::error::{DefinitionError, SpawnError};
use crate::rng::RandomStream;

type DeathCallback = Box<dyn FnMut(&DeathReport) + Send + Sync>;

/// Искры на попадании
const HIT_SPARK_COUNT: u32 = 8;
const HIT_SPARK_LIFETIME: f32 = 0.25;

/// Буферы одного тика (собираются до конца тика, потом применяются)
#[derive(Default)]
struct TickBuffers {
    commands: Vec<(ActorId, ActorCommand)>,
    cues: Vec<EffectCue>,
    events: Vec<EncounterEvent>,
    deaths: Vec<DeathReport>,
}

pub struct EncounterDirector {
    name: String,
    registry: DefinitionRegistry,
    settings: EncounterSettings,
    roster: Vec<Actor>,
    projectiles: ProjectileRegistry,
    waves: WaveSchedule,
    rng: RandomStream,
    seed: u64,
    next_actor_id: u64,
    player: Option<EntityHandle>,
    elapsed: f32,
    ticks: u64,
    budget: EffectBudget,
    /// Команды из on_enter при spawn вне тика (выполняются следующим тиком)
    pending_commands: Vec<(ActorId, ActorCommand)>,
    pending_cues: Vec<EffectCue>,
    events: Vec<EncounterEvent>,
    deaths: Vec<DeathReport>,
    death_callbacks: Vec<DeathCallback>,
    dropped_requests: u64,
    shut_down: bool,
}

impl std::fmt::Debug for EncounterDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncounterDirector")
            .field("name", &self.name)
            .field("actors", &self.roster.len())
            .field("projectiles", &self.projectiles.len())
            .field("elapsed", &self.elapsed)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl EncounterDirector {
    pub fn new(registry: DefinitionRegistry, settings: EncounterSettings, seed: u64) -> Result<Self, DefinitionError> {
        registry.validate_references()?;

        Ok(Self {
            name: "encounter".to_string(),
            registry,
            projectiles: ProjectileRegistry::new(settings.max_projectiles),
            budget: EffectBudget::new(settings.particle_budget),
            settings,
            roster: Vec::new(),
            waves: WaveSchedule::default(),
            rng: RandomStream::new(seed),
            seed,
            next_actor_id: 1,
            player: None,
            elapsed: 0.0,
            ticks: 0,
            pending_commands: Vec::new(),
            pending_cues: Vec::new(),
            events: Vec::new(),
            deaths: Vec::new(),
            death_callbacks: Vec::new(),
            dropped_requests: 0,
            shut_down: false,
        })
    }

    /// Encounter из конфига; `seed` используется, если конфиг свой не задал
    pub fn from_config(config: &EncounterConfig, seed: u64) -> Result<Self, DefinitionError> {
        let registry = config.registry()?;
        let mut director = Self::new(registry, config.settings.clone(), config.seed.unwrap_or(seed))?;
        director.name = config.name.clone();
        director.waves = WaveSchedule::new(config.waves.clone());
        Ok(director)
    }

    /// Encounter из конфига; без seed в конфиге seed берётся из Random service движка
    pub fn from_config_with_engine(
        config: &EncounterConfig,
        engine: &mut dyn EngineBridge,
    ) -> Result<Self, DefinitionError> {
        let seed = match config.seed {
            Some(seed) => seed,
            None => RandomStream::from_engine_float(engine.random_float()).seed(),
        };
        Self::from_config(config, seed)
    }

    /// Seed корневого RandomStream encounter'а
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &EncounterSettings {
        &self.settings
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    pub fn waves(&self) -> &WaveSchedule {
        &self.waves
    }

    /// Цель для sensors, hover, aim (None → акторы её не видят)
    pub fn set_player(&mut self, player: Option<EntityHandle>) {
        self.player = player;
    }

    pub fn player(&self) -> Option<EntityHandle> {
        self.player
    }

    /// Callback на каждую смерть (loot, score); вызывается в конце тика
    pub fn on_actor_died(&mut self, callback: impl FnMut(&DeathReport) + Send + Sync + 'static) {
        self.death_callbacks.push(Box::new(callback));
    }

    /// Создать актора; ids не переиспользуются
    ///
    /// После `shutdown` всегда `SpawnError::EncounterClosed`.
    pub fn spawn(&mut self, engine: &mut dyn EngineBridge, type_name: &str, position: Vec2) -> Result<ActorId, SpawnError> {
        let mut events = Vec::new();
        let spawned = self.spawn_into(engine, type_name, position, &mut events);
        self.events.append(&mut events);
        spawned
    }

    /// Spawn с ActorSpawned в переданный буфер (внутри тика: в порядке событий тика)
    fn spawn_into(
        &mut self,
        engine: &mut dyn EngineBridge,
        type_name: &str,
        position: Vec2,
        events: &mut Vec<EncounterEvent>,
    ) -> Result<ActorId, SpawnError> {
        if self.shut_down {
            return Err(SpawnError::EncounterClosed);
        }

        let definition = self
            .registry
            .get(type_name)
            .ok_or_else(|| SpawnError::UnknownActorType(type_name.to_string()))?;

        if self.living_count() >= self.settings.max_actors {
            return Err(SpawnError::RosterFull {
                limit: self.settings.max_actors,
            });
        }

        let handle = engine
            .instantiate(&definition.prefab, position)
            .ok_or_else(|| SpawnError::InstantiateFailed {
                prefab: definition.prefab.clone(),
            })?;
        engine.set_body_type(handle, definition.body.body_type);
        engine.set_gravity_scale(handle, definition.body.gravity_scale);

        let id = ActorId(self.next_actor_id);
        self.next_actor_id += 1;

        let mut actor = Actor::new(id, handle, Arc::clone(&definition), position, self.rng.fork());
        // Prefab может быть отзеркален заранее
        if let Some(scale) = engine.scale(handle) {
            actor.facing = Facing::from_scale_x(scale.x);
        }
        let signals = Signals {
            player: self.player_position(engine),
            ..Signals::default()
        };

        let mut commands = Vec::new();
        start_actor(
            &mut actor,
            &signals,
            &mut StepOutput {
                commands: &mut commands,
                cues: &mut self.pending_cues,
            },
        );
        self.pending_commands
            .extend(commands.into_iter().map(|command| (id, command)));

        events.push(EncounterEvent::ActorSpawned {
            actor: id,
            type_name: definition.name.clone(),
            handle,
            position,
        });
        self.roster.push(actor);

        Ok(id)
    }

    /// Тик с dt из TimeService движка
    pub fn advance(&mut self, engine: &mut dyn EngineBridge) {
        let dt = engine.delta_time();
        self.tick(engine, dt);
    }

    pub fn tick(&mut self, engine: &mut dyn EngineBridge, dt: f32) {
        if self.shut_down {
            return;
        }

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += dt;
        self.ticks += 1;
        self.budget.begin_tick();

        let player = self.player_position(engine);
        let mut buffers = TickBuffers {
            commands: std::mem::take(&mut self.pending_commands),
            cues: std::mem::take(&mut self.pending_cues),
            ..TickBuffers::default()
        };

        for actor in self.roster.iter_mut() {
            tick_actor(actor, engine, dt, player, &self.projectiles, &self.settings, &mut buffers);
        }

        self.tick_projectiles(engine, dt, &mut buffers);
        self.apply_commands(engine, &mut buffers);
        self.release_waves(engine, &mut buffers);

        // cues от spawn'ов этого тика (волны, summon)
        buffers.cues.append(&mut self.pending_cues);
        dispatch(buffers.cues.drain(..), &mut *engine, &mut self.budget);

        for id in self.projectiles.reap(engine) {
            crate::log(&format!("🔫 [{}] projectile #{} reaped", self.name, id.0));
        }
        self.reap_actors(engine, &mut buffers);

        for report in &buffers.deaths {
            for callback in self.death_callbacks.iter_mut() {
                callback(report);
            }
        }
        self.deaths.append(&mut buffers.deaths);
        self.events.append(&mut buffers.events);
    }

    /// Принудительный переход (применяется на следующем тике актора)
    pub fn override_state(&mut self, id: ActorId, state: StateKind) -> bool {
        let Some(actor) = self.roster.iter_mut().find(|actor| actor.id == id) else {
            return false;
        };
        if !actor.is_alive() || state.is_dead() || !actor.definition.declares(state) {
            return false;
        }
        actor.machine.request_override(state);
        true
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.roster.iter().find(|actor| actor.id == id)
    }

    /// Roster в порядке spawn (включая акторов в death animation)
    pub fn actors(&self) -> &[Actor] {
        &self.roster
    }

    pub fn living_count(&self) -> usize {
        self.roster.iter().filter(|actor| actor.is_alive()).count()
    }

    pub fn projectiles(&self) -> &ProjectileRegistry {
        &self.projectiles
    }

    /// Death ledger (в порядке смертей)
    pub fn deaths(&self) -> &[DeathReport] {
        &self.deaths
    }

    /// Живых нет, волн не осталось, spawn'ов в очереди нет
    pub fn is_cleared(&self) -> bool {
        self.living_count() == 0 && self.waves.is_finished() && self.pending_commands.is_empty()
    }

    pub fn events(&self) -> &[EncounterEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<EncounterEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Spawn'ы и выстрелы акторов, отброшенные из-за лимитов
    pub fn dropped_requests(&self) -> u64 {
        self.dropped_requests
    }

    pub fn effect_budget(&self) -> &EffectBudget {
        &self.budget
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Детерминированный слепок состояния (для сравнения прогонов)
    pub fn snapshot(&self) -> Vec<u8> {
        let mut snapshot = Vec::new();
        snapshot.extend_from_slice(&self.ticks.to_le_bytes());
        snapshot.extend_from_slice(&self.elapsed.to_bits().to_le_bytes());
        snapshot.extend_from_slice(&self.next_actor_id.to_le_bytes());

        for actor in &self.roster {
            snapshot.extend_from_slice(&actor.id.0.to_le_bytes());
            snapshot.extend_from_slice(&actor.handle.0.to_le_bytes());
            snapshot.extend_from_slice(&actor.health.current().to_bits().to_le_bytes());
            for value in [
                actor.kinematics.position.x,
                actor.kinematics.position.y,
                actor.kinematics.velocity.x,
                actor.kinematics.velocity.y,
                actor.speed_scale,
            ] {
                snapshot.extend_from_slice(&value.to_bits().to_le_bytes());
            }
            snapshot.extend_from_slice(&(actor.phase as u64).to_le_bytes());
            snapshot.extend_from_slice(&actor.rng.draws().to_le_bytes());
            snapshot.extend_from_slice(format!("{:?}|{:?}", actor.state(), actor.facing).as_bytes());
        }

        for projectile in self.projectiles.iter() {
            snapshot.extend_from_slice(&projectile.id.0.to_le_bytes());
            snapshot.extend_from_slice(&projectile.lifetime.remaining().to_bits().to_le_bytes());
        }

        snapshot.extend_from_slice(&(self.deaths.len() as u64).to_le_bytes());
        snapshot
    }

    /// Конец encounter'а: уничтожить все entities, дальнейшие тики no-op
    pub fn shutdown(&mut self, engine: &mut dyn EngineBridge) {
        if self.shut_down {
            return;
        }

        for actor in self.roster.drain(..) {
            if engine.exists(actor.handle) {
                engine.destroy(actor.handle);
            }
            self.events.push(EncounterEvent::ActorRemoved { actor: actor.id });
        }
        self.projectiles.clear(engine);
        self.pending_commands.clear();
        self.pending_cues.clear();
        self.shut_down = true;

        crate::log_info(&format!(
            "🏁 [{}] shut down after {} ticks ({:.2}s), {} deaths",
            self.name,
            self.ticks,
            self.elapsed,
            self.deaths.len()
        ));
    }

    fn player_position(&self, engine: &dyn EngineBridge) -> Option<Vec2> {
        self.player.and_then(|player| engine.position(player))
    }

    fn tick_projectiles(&mut self, engine: &mut dyn EngineBridge, dt: f32, buffers: &mut TickBuffers) {
        for outcome in self.projectiles.tick(engine, dt) {
            if let ProjectileFate::HitTarget { target } = outcome.fate {
                buffers.events.push(EncounterEvent::ProjectileHit {
                    projectile: outcome.id,
                    target,
                    damage: outcome.damage,
                });
            }

            let impact = matches!(
                outcome.fate,
                ProjectileFate::HitTarget { .. } | ProjectileFate::Blocked { .. }
            );
            if impact && self.settings.hit_sparks {
                if let Some(position) = outcome.position {
                    buffers.cues.push(sparks(position, Vec2::Y));
                }
            }

            buffers.events.push(EncounterEvent::ProjectileDestroyed {
                projectile: outcome.id,
                fate: outcome.fate,
            });
        }
    }

    fn apply_commands(&mut self, engine: &mut dyn EngineBridge, buffers: &mut TickBuffers) {
        for (owner, command) in std::mem::take(&mut buffers.commands) {
            match command {
                ActorCommand::SpawnActor { type_name, position } => {
                    if let Err(err) = self.spawn_into(engine, &type_name, position, &mut buffers.events) {
                        self.drop_request(owner, err.to_string(), buffers);
                    }
                }
                ActorCommand::FireProjectile {
                    spec,
                    origin,
                    direction,
                } => {
                    let fired = self
                        .projectiles
                        .fire(engine, owner, &spec, origin, direction)
                        .and_then(|id| self.projectiles.get(id));
                    let Some(projectile) = fired else {
                        self.drop_request(owner, format!("projectile `{}` not fired", spec.prefab), buffers);
                        continue;
                    };

                    buffers.events.push(EncounterEvent::ProjectileFired {
                        projectile: projectile.id,
                        owner,
                        handle: projectile.handle,
                    });
                    if let Some(sound) = &spec.sound {
                        buffers.cues.push(EffectCue::sound(sound.clone(), 1.0));
                    }
                }
            }
        }
    }

    fn drop_request(&mut self, owner: ActorId, reason: String, buffers: &mut TickBuffers) {
        self.dropped_requests += 1;
        crate::log_warning(&format!("⚠️ [{}] dropped request from {}: {}", self.name, owner, reason));
        buffers.events.push(EncounterEvent::RequestDropped { actor: owner, reason });
    }

    fn release_waves(&mut self, engine: &mut dyn EngineBridge, buffers: &mut TickBuffers) {
        let cleared = self.living_count() == 0 && self.pending_commands.is_empty();

        for wave in self.waves.due(self.elapsed, cleared) {
            let mut spawned = 0;
            for point in &wave.spawns {
                match self.spawn_into(engine, &point.actor, point.position(), &mut buffers.events) {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        self.dropped_requests += 1;
                        crate::log_warning(&format!(
                            "🌊 [{}] wave `{}` could not spawn `{}`: {}",
                            self.name, wave.name, point.actor, err
                        ));
                    }
                }
            }
            buffers.events.push(EncounterEvent::WaveReleased {
                wave: wave.name.clone(),
                spawned,
            });
        }
    }

    fn reap_actors(&mut self, engine: &mut dyn EngineBridge, buffers: &mut TickBuffers) {
        let mut kept = Vec::with_capacity(self.roster.len());
        for actor in self.roster.drain(..) {
            if actor.removal.is_none() {
                kept.push(actor);
                continue;
            }

            if engine.exists(actor.handle) {
                engine.destroy(actor.handle);
            }
            buffers.events.push(EncounterEvent::ActorRemoved { actor: actor.id });
        }
        self.roster = kept;
    }
}

/// Один актор за тик; все побочные эффекты складываются в buffers
fn tick_actor(
    actor: &mut Actor,
    engine: &mut dyn EngineBridge,
    dt: f32,
    player: Option<Vec2>,
    own_projectiles: &ProjectileRegistry,
    settings: &EncounterSettings,
    buffers: &mut TickBuffers,
) {
    if actor.removal.is_some() {
        return;
    }

    let position = engine.position(actor.handle).filter(|_| engine.exists(actor.handle));
    let Some(position) = position else {
        vanish(actor, buffers);
        return;
    };
    actor.kinematics.position = position;
    actor.kinematics.velocity = engine.velocity(actor.handle).unwrap_or(Vec2::ZERO);
    actor.invulnerability.tick(dt);

    // Снаряды encounter'а (выстрелы врагов) своих не ранят
    let contacts: Vec<Contact> = probe_overlaps(&*engine, actor.handle)
        .unwrap_or_default()
        .into_iter()
        .filter(|contact| !own_projectiles.contains_handle(contact.entity))
        .collect();

    let mut signals = Signals {
        player,
        touching_wall: contacts.iter().any(|contact| contact.has(Category::Wall)),
        grounded: contacts.iter().any(|contact| contact.has(Category::Ground)),
    };
    if let Some(arena) = &settings.arena {
        signals.grounded |= arena.on_floor(position);
        signals.touching_wall |= arena.at_wall(position);
    }

    let hit = resolve_hit(actor, &contacts, settings, buffers);
    check_phases(actor, buffers);

    let mut commands = Vec::new();
    let transition = step_actor(
        actor,
        &StepInput {
            dt,
            signals: &signals,
            hit,
        },
        &mut StepOutput {
            commands: &mut commands,
            cues: &mut buffers.cues,
        },
    );
    buffers
        .commands
        .extend(commands.into_iter().map(|command| (actor.id, command)));

    if let Some(transition) = transition {
        buffers.events.push(EncounterEvent::StateChanged {
            actor: actor.id,
            from: transition.from,
            to: transition.to,
            cause: transition.cause,
        });

        if transition.to.is_dead() {
            let report = death_report(actor, DeathCause::Killed);
            buffers.events.push(EncounterEvent::ActorDied(report.clone()));
            buffers.deaths.push(report);
        }
    }

    sync_facing(actor, engine);
    engine.set_velocity(actor.handle, actor.kinematics.velocity);

    if let Some(arena) = &settings.arena {
        let clamped = arena.clamp(actor.kinematics.position);
        if clamped != actor.kinematics.position {
            engine.set_position(actor.handle, clamped);
            actor.kinematics.position = clamped;
        }
    }

    if actor.machine.death_finished() {
        actor.removal = Some(DeathCause::Killed);
    }
}

/// DamageResolver → health; true если удар прошёл в этом тике
fn resolve_hit(actor: &mut Actor, contacts: &[Contact], settings: &EncounterSettings, buffers: &mut TickBuffers) -> bool {
    if !actor.is_alive() || contacts.is_empty() {
        return false;
    }

    let definition = Arc::clone(&actor.definition);
    let resolver = DamageResolver::new(&definition.damage);
    let Some(event) = resolver.resolve(actor.as_victim(), contacts) else {
        return false;
    };

    let applied = apply_damage(&mut actor.health, &event);
    if applied.is_lethal() {
        actor.killer = Some(event.attacker);
    }

    buffers.events.push(EncounterEvent::DamageDealt {
        attacker: event.attacker,
        victim: actor.id,
        category: event.category,
        amount: applied.amount(),
        lethal: applied.is_lethal(),
    });
    if settings.hit_sparks {
        let direction = event.knockback.try_normalize().unwrap_or(Vec2::Y);
        buffers.cues.push(sparks(actor.kinematics.position, direction));
    }

    actor.last_hit = Some(event);
    true
}

/// Пороги здоровья: каждая фаза срабатывает один раз, по порядку
fn check_phases(actor: &mut Actor, buffers: &mut TickBuffers) {
    if !actor.is_alive() {
        return;
    }

    let definition = Arc::clone(&actor.definition);
    while let Some(rule) = definition.phases.get(actor.phase) {
        if actor.health.fraction() >= rule.below_fraction {
            break;
        }

        actor.phase += 1;
        actor.speed_scale = rule.speed_scale;
        if let Some(state) = rule.enter {
            actor.machine.request_override(state);
        }
        for spec in &rule.on_enter {
            let cue = spec.resolve(actor.kinematics.position, actor.facing, &mut actor.rng);
            buffers.cues.push(cue);
        }
        buffers.events.push(EncounterEvent::PhaseChanged {
            actor: actor.id,
            phase: actor.phase,
        });
    }
}

/// Движок потерял entity: актор мёртв без death animation
fn vanish(actor: &mut Actor, buffers: &mut TickBuffers) {
    crate::log_warning(&format!(
        "👻 {} ({}) lost its engine entity {}, treating as dead",
        actor.id,
        actor.type_name(),
        actor.handle
    ));

    let already_reported = actor.state().is_dead();
    actor.health.kill();
    actor.removal = Some(DeathCause::Vanished);

    if !already_reported {
        let report = death_report(actor, DeathCause::Vanished);
        buffers.events.push(EncounterEvent::ActorDied(report.clone()));
        buffers.deaths.push(report);
    }
}

fn death_report(actor: &Actor, cause: DeathCause) -> DeathReport {
    DeathReport {
        actor: actor.id,
        type_name: actor.type_name().to_string(),
        position: actor.kinematics.position,
        score: actor.definition.score,
        killer: actor.killer,
        cause,
    }
}

/// Знак scale.x = facing (пишем только при развороте)
fn sync_facing(actor: &Actor, engine: &mut dyn EngineBridge) {
    let Some(scale) = engine.scale(actor.handle) else {
        return;
    };
    let sign = actor.facing.sign();
    if (scale.x < 0.0) != (sign < 0.0) {
        engine.set_scale(actor.handle, Vec2::new(scale.x.abs() * sign, scale.y));
    }
}

fn sparks(position: Vec2, direction: Vec2) -> EffectCue {
    EffectCue::Particles(ParticleBurst {
        position,
        direction,
        count: HIT_SPARK_COUNT,
        lifetime: HIT_SPARK_LIFETIME,
        style: ParticleStyle::Sparks,
    })
}
