//! State behaviors: update функции states
//!
//! Behavior меняет только своего актора (velocity, facing), эмитит cue'ы и
//! просит director о spawn'ах через `ActorCommand`. Переходов сам не делает:
//! единственный сигнал наружу это `finish()` (done flag).

use std::fmt;
use std::sync::Arc;

use bevy::math::Vec2;
use serde::Deserialize;

use super::StateKind;
use crate::actor::{ActorId, Facing, Health};
use crate::combat::{DamageEvent, ProjectileSpec};
use crate::effects::{CueSpec, EffectCue, ParticleBurst, ParticleStyle};
use crate::rng::RandomStream;

/// Горизонтальная скорость flinch гасится с этим темпом (1/сек)
const FLINCH_DAMPING: f32 = 8.0;
/// После разворота у стены patrol не разворачивается повторно это время
const PATROL_TURN_COOLDOWN: f32 = 0.5;
/// Slam выровнялся над целью
const SLAM_ALIGN_TOLERANCE: f32 = 0.25;
/// Clap: руки сошлись
const CLAP_CONTACT_DISTANCE: f32 = 0.3;
const IMPACT_SHAKE_DURATION: f32 = 0.4;

/// Внешние сигналы за этот тик (из физики и director'а)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    /// Позиция игрока, если он известен encounter'у
    pub player: Option<Vec2>,
    pub touching_wall: bool,
    pub grounded: bool,
}

/// Рабочие данные behavior'а, сбрасываются при входе в state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorScratch {
    pub counter: u32,
    pub cooldown: f32,
    pub anchor: Option<Vec2>,
}

/// Запрос актора к director'у (применяется в конце тика)
#[derive(Debug, Clone, PartialEq)]
pub enum ActorCommand {
    SpawnActor { type_name: String, position: Vec2 },
    FireProjectile {
        spec: ProjectileSpec,
        origin: Vec2,
        direction: Vec2,
    },
}

/// Всё, что видит и может менять behavior за один вызов
pub struct StateContext<'a> {
    pub actor: ActorId,
    pub state: StateKind,
    pub position: Vec2,
    pub velocity: &'a mut Vec2,
    pub facing: &'a mut Facing,
    pub health: Health,
    pub dt: f32,
    pub time_in_state: f32,
    pub speed_scale: f32,
    pub signals: &'a Signals,
    pub last_hit: Option<&'a DamageEvent>,
    pub rng: &'a mut RandomStream,
    pub commands: &'a mut Vec<ActorCommand>,
    pub cues: &'a mut Vec<EffectCue>,
    pub scratch: &'a mut BehaviorScratch,
    pub(crate) done: &'a mut bool,
}

impl StateContext<'_> {
    /// Сигнал "state закончил работу" (проверяется на следующем тике)
    pub fn finish(&mut self) {
        *self.done = true;
    }

    pub fn is_finished(&self) -> bool {
        *self.done
    }

    pub fn emit(&mut self, cue: EffectCue) {
        self.cues.push(cue);
    }

    pub fn cue(&mut self, spec: &CueSpec) {
        let cue = spec.resolve(self.position, *self.facing, self.rng);
        self.cues.push(cue);
    }

    pub fn request(&mut self, command: ActorCommand) {
        self.commands.push(command);
    }

    pub fn face_player(&mut self) {
        if let Some(player) = self.signals.player {
            *self.facing = self.facing.toward(player.x - self.position.x);
        }
    }
}

/// Пользовательский behavior (для типов, которым мало встроенных)
pub trait StateBehavior: fmt::Debug + Send + Sync {
    fn on_enter(&self, _ctx: &mut StateContext) {}

    fn update(&self, ctx: &mut StateContext);

    fn on_exit(&self, _ctx: &mut StateContext) {}
}

/// Встроенные behaviors (конфигурируются из RON)
#[derive(Debug, Clone, Default, Deserialize)]
pub enum Behavior {
    /// Стоять на месте
    #[default]
    Hold,
    /// Ходить вперёд, разворот у стены
    Patrol { speed: f32 },
    /// Идти к игроку
    Chase { speed: f32 },
    /// Рывок в сторону взгляда; стена → finish
    Charge { speed: f32 },
    /// Отлёт от удара
    Flinch {
        #[serde(default = "default_scale")]
        knockback_scale: f32,
    },
    /// Парить над игроком на высоте `height`
    Hover { height: f32, speed: f32 },
    /// Выровняться над игроком и упасть; земля → shake + finish
    Slam { speed: f32, shake: f32 },
    /// Сойтись к точке игрока; контакт → shake + finish
    Clap { speed: f32, shake: f32 },
    /// Серия выстрелов, `spread` в градусах
    Barrage {
        projectile: ProjectileSpec,
        shots: u32,
        interval: f32,
        #[serde(default)]
        spread: f32,
    },
    /// Призвать `count` акторов в линию
    Summon {
        actor_type: String,
        count: u32,
        #[serde(default = "default_spacing")]
        spacing: f32,
    },
    /// Death animation: частицы каждые `burst_interval` секунд
    Dying { burst_interval: f32, style: ParticleStyle },
    #[serde(skip)]
    Custom(Arc<dyn StateBehavior>),
}

fn default_scale() -> f32 {
    1.0
}

fn default_spacing() -> f32 {
    1.5
}

impl Behavior {
    pub fn custom(behavior: impl StateBehavior + 'static) -> Self {
        Behavior::Custom(Arc::new(behavior))
    }

    /// Тип актора, которого behavior призывает
    pub fn summons(&self) -> Option<&str> {
        match self {
            Behavior::Summon { actor_type, .. } => Some(actor_type),
            _ => None,
        }
    }

    pub fn on_enter(&self, ctx: &mut StateContext) {
        match self {
            Behavior::Hold | Behavior::Patrol { .. } | Behavior::Chase { .. } => {}
            Behavior::Charge { .. } => ctx.face_player(),
            Behavior::Flinch { knockback_scale } => {
                if let Some(hit) = ctx.last_hit {
                    // Knockback толкает от атакующего → смотрим против него
                    let knockback = hit.knockback;
                    *ctx.facing = ctx.facing.toward(-knockback.x);
                    *ctx.velocity = knockback * *knockback_scale;
                }
            }
            Behavior::Hover { .. } => {
                ctx.scratch.anchor = Some(ctx.position);
            }
            Behavior::Slam { .. } | Behavior::Clap { .. } => {
                ctx.scratch.anchor = Some(ctx.signals.player.unwrap_or(ctx.position));
                ctx.face_player();
            }
            Behavior::Barrage { .. } => {
                ctx.scratch.counter = 0;
                ctx.scratch.cooldown = 0.0;
            }
            Behavior::Summon {
                actor_type,
                count,
                spacing,
            } => {
                let half = count.saturating_sub(1) as f32 / 2.0;
                for index in 0..*count {
                    let offset = (index as f32 - half) * spacing;
                    ctx.request(ActorCommand::SpawnActor {
                        type_name: actor_type.clone(),
                        position: ctx.position + Vec2::new(offset, 0.0),
                    });
                }
            }
            Behavior::Dying { .. } => {
                ctx.velocity.x = 0.0;
                ctx.scratch.cooldown = 0.0;
            }
            Behavior::Custom(custom) => custom.on_enter(ctx),
        }
    }

    pub fn update(&self, ctx: &mut StateContext) {
        let scale = ctx.speed_scale;
        match self {
            Behavior::Hold | Behavior::Summon { .. } => {
                ctx.velocity.x = 0.0;
            }
            Behavior::Patrol { speed } => {
                ctx.scratch.cooldown -= ctx.dt;
                if ctx.signals.touching_wall && ctx.scratch.cooldown <= 0.0 {
                    *ctx.facing = ctx.facing.flipped();
                    ctx.scratch.cooldown = PATROL_TURN_COOLDOWN;
                }
                ctx.velocity.x = ctx.facing.sign() * speed * scale;
            }
            Behavior::Chase { speed } => {
                ctx.face_player();
                ctx.velocity.x = ctx.facing.sign() * speed * scale;
            }
            Behavior::Charge { speed } => {
                if ctx.signals.touching_wall {
                    ctx.velocity.x = 0.0;
                    ctx.finish();
                } else {
                    ctx.velocity.x = ctx.facing.sign() * speed * scale;
                }
            }
            Behavior::Flinch { .. } => {
                ctx.velocity.x *= (1.0 - FLINCH_DAMPING * ctx.dt).max(0.0);
            }
            Behavior::Hover { height, speed } => {
                let target = match ctx.signals.player {
                    Some(player) => player + Vec2::new(0.0, *height),
                    None => ctx.scratch.anchor.unwrap_or(ctx.position),
                };
                *ctx.velocity = (target - ctx.position).clamp_length_max(speed * scale);
                ctx.face_player();
            }
            Behavior::Slam { speed, shake } => update_slam(ctx, speed * scale, *shake),
            Behavior::Clap { speed, shake } => {
                let anchor = ctx.scratch.anchor.unwrap_or(ctx.position);
                let delta = anchor - ctx.position;
                if delta.length() <= CLAP_CONTACT_DISTANCE {
                    *ctx.velocity = Vec2::ZERO;
                    if ctx.scratch.counter == 0 {
                        ctx.scratch.counter = 1;
                        ctx.emit(EffectCue::shake(*shake, IMPACT_SHAKE_DURATION));
                        ctx.emit(impact_burst(ctx.position, Vec2::Y, 16, ParticleStyle::Flash));
                    }
                    ctx.finish();
                } else {
                    *ctx.velocity = delta.normalize_or_zero() * speed * scale;
                }
            }
            Behavior::Barrage {
                projectile,
                shots,
                interval,
                spread,
            } => {
                *ctx.velocity = Vec2::ZERO;
                ctx.scratch.cooldown -= ctx.dt;
                if ctx.scratch.cooldown <= 0.0 && ctx.scratch.counter < *shots {
                    let aim = ctx
                        .signals
                        .player
                        .map(|player| player - ctx.position)
                        .and_then(|aim| aim.try_normalize())
                        .unwrap_or(Vec2::new(ctx.facing.sign(), 0.0));
                    let angle = ctx.rng.next_range(-spread, *spread).to_radians();
                    let direction = Vec2::from_angle(angle).rotate(aim);

                    *ctx.facing = ctx.facing.toward(direction.x);
                    ctx.request(ActorCommand::FireProjectile {
                        spec: projectile.clone(),
                        origin: ctx.position,
                        direction,
                    });
                    ctx.scratch.counter += 1;
                    ctx.scratch.cooldown = *interval;
                }
                if ctx.scratch.counter >= *shots {
                    ctx.finish();
                }
            }
            Behavior::Dying { burst_interval, style } => {
                ctx.velocity.x = 0.0;
                ctx.scratch.cooldown -= ctx.dt;
                if ctx.scratch.cooldown <= 0.0 {
                    ctx.scratch.cooldown = *burst_interval;
                    let offset = Vec2::new(ctx.rng.next_range(-0.5, 0.5), ctx.rng.next_range(-0.5, 0.5));
                    ctx.emit(impact_burst(ctx.position + offset, Vec2::Y, 12, *style));
                }
            }
            Behavior::Custom(custom) => custom.update(ctx),
        }
    }

    pub fn on_exit(&self, ctx: &mut StateContext) {
        match self {
            Behavior::Charge { .. } => ctx.velocity.x = 0.0,
            Behavior::Slam { .. } | Behavior::Clap { .. } => *ctx.velocity = Vec2::ZERO,
            Behavior::Custom(custom) => custom.on_exit(ctx),
            _ => {}
        }
    }
}

/// Slam: counter 0 выравнивание над anchor, 1 падение, 2 удар случился
fn update_slam(ctx: &mut StateContext, speed: f32, shake: f32) {
    let anchor = ctx.scratch.anchor.unwrap_or(ctx.position);

    if ctx.scratch.counter == 0 {
        let dx = anchor.x - ctx.position.x;
        if dx.abs() <= SLAM_ALIGN_TOLERANCE {
            ctx.scratch.counter = 1;
        } else {
            *ctx.velocity = Vec2::new(dx.signum() * speed, 0.0);
            return;
        }
    }

    if ctx.scratch.counter == 1 {
        if ctx.signals.grounded {
            ctx.scratch.counter = 2;
            *ctx.velocity = Vec2::ZERO;
            ctx.emit(EffectCue::shake(shake, IMPACT_SHAKE_DURATION));
            ctx.emit(impact_burst(ctx.position, Vec2::Y, 24, ParticleStyle::Dust));
            ctx.finish();
        } else {
            *ctx.velocity = Vec2::new(0.0, -speed);
        }
    }
}

fn impact_burst(position: Vec2, direction: Vec2, count: u32, style: ParticleStyle) -> EffectCue {
    EffectCue::Particles(ParticleBurst {
        position,
        direction,
        count,
        lifetime: 0.6,
        style,
    })
}
