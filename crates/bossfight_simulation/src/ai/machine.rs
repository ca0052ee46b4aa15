//! ActorStateMachine: один активный state, переходы по приоритету
//!
//! Порядок проверки за тик:
//! 1. health ≤ 0 → Dead (перебивает всё, в том числе атаку посреди замаха)
//! 2. phase override (пороги здоровья / внешний override_state)
//! 3. удар в этом тике → BeingHit (если тип его объявляет)
//! 4. sensor region → sensor.enter
//! 5. behavior вызвал finish() → next
//! 6. timer истёк → next
//! 7. иначе остаёмся и крутим update
//!
//! На тике перехода update не вызывается (ни старого, ни нового state):
//! старый получает on_exit, новый on_enter, update нового со следующего тика.

use std::sync::Arc;

use super::behavior::{ActorCommand, BehaviorScratch, Signals, StateContext};
use super::StateKind;
use crate::actor::Actor;
use crate::effects::EffectCue;
use crate::timer::Countdown;

/// Почему произошёл переход
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Death,
    PhaseOverride,
    Hit,
    Sensor,
    Completed,
    TimerExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateKind,
    pub to: StateKind,
    pub cause: TransitionCause,
}

/// Состояние FSM одного актора (definition отдельно, в Arc)
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: StateKind,
    timer: Option<Countdown>,
    time_in_state: f32,
    done: bool,
    scratch: BehaviorScratch,
    pending_override: Option<StateKind>,
}

impl StateMachine {
    pub fn new(initial: StateKind) -> Self {
        Self {
            current: initial,
            timer: None,
            time_in_state: 0.0,
            done: false,
            scratch: BehaviorScratch::default(),
            pending_override: None,
        }
    }

    pub fn current(&self) -> StateKind {
        self.current
    }

    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    pub fn timer(&self) -> Option<&Countdown> {
        self.timer.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn pending_override(&self) -> Option<StateKind> {
        self.pending_override
    }

    /// Dead и death animation доиграла (или у Dead нет длительности)
    pub fn death_finished(&self) -> bool {
        self.current.is_dead() && self.timer.as_ref().is_none_or(Countdown::expired)
    }

    pub(crate) fn request_override(&mut self, kind: StateKind) {
        self.pending_override = Some(kind);
    }
}

/// Вход одного тика для FSM
pub struct StepInput<'a> {
    pub dt: f32,
    pub signals: &'a Signals,
    /// DamageEvent применён к актору в этом тике
    pub hit: bool,
}

/// Буферы, куда FSM складывает побочные эффекты
pub struct StepOutput<'a> {
    pub commands: &'a mut Vec<ActorCommand>,
    pub cues: &'a mut Vec<EffectCue>,
}

/// Войти в initial state при spawn (enter hooks + cues, без update)
pub fn start_actor(actor: &mut Actor, signals: &Signals, out: &mut StepOutput) {
    let initial = actor.machine.current;
    enter_state(actor, initial, signals, out);
}

/// Один тик FSM актора
pub fn step_actor(actor: &mut Actor, input: &StepInput, out: &mut StepOutput) -> Option<Transition> {
    let dt = input.dt;
    actor.machine.time_in_state += dt;
    if let Some(timer) = actor.machine.timer.as_mut() {
        timer.tick(dt);
    }

    let from = actor.machine.current;
    let Some((to, cause)) = evaluate(actor, input) else {
        run_update(actor, input, out);
        return None;
    };

    exit_state(actor, input.signals, out);
    enter_state(actor, to, input.signals, out);

    Some(Transition { from, to, cause })
}

/// Правила перехода по приоритету; Dead поглощающий
fn evaluate(actor: &mut Actor, input: &StepInput) -> Option<(StateKind, TransitionCause)> {
    let current = actor.machine.current;

    if current.is_dead() {
        actor.machine.pending_override = None;
        return None;
    }

    if !actor.health.is_alive() {
        return Some((StateKind::Dead, TransitionCause::Death));
    }

    if let Some(kind) = actor.machine.pending_override.take() {
        if actor.definition.declares(kind) {
            return Some((kind, TransitionCause::PhaseOverride));
        }
    }

    if input.hit && current != StateKind::BeingHit && actor.definition.declares(StateKind::BeingHit) {
        return Some((StateKind::BeingHit, TransitionCause::Hit));
    }

    let definition = Arc::clone(&actor.definition);
    let state = definition.state(current)?;

    if let (Some(sensor), Some(player)) = (&state.sensor, input.signals.player) {
        let distance = player.distance(actor.kinematics.position);
        if sensor.enter != current && sensor.triggered(distance) {
            return Some((sensor.enter, TransitionCause::Sensor));
        }
    }

    if actor.machine.done {
        if let Some(next) = state.next.choose(&mut actor.rng) {
            return Some((next, TransitionCause::Completed));
        }
    }

    if actor.machine.timer.as_ref().is_some_and(Countdown::expired) {
        if let Some(next) = state.next.choose(&mut actor.rng) {
            return Some((next, TransitionCause::TimerExpired));
        }
    }

    None
}

fn enter_state(actor: &mut Actor, kind: StateKind, signals: &Signals, out: &mut StepOutput) {
    let definition = Arc::clone(&actor.definition);
    let state = definition.state(kind);

    let machine = &mut actor.machine;
    machine.current = kind;
    machine.time_in_state = 0.0;
    machine.done = false;
    machine.scratch = BehaviorScratch::default();
    machine.timer = state
        .and_then(|state| state.roll_duration(&mut actor.rng))
        .map(Countdown::new);

    let Some(state) = state else {
        return;
    };

    resolve_cues(actor, &state.on_enter, out);
    with_context(actor, 0.0, signals, out, |ctx| state.behavior.on_enter(ctx));
}

fn exit_state(actor: &mut Actor, signals: &Signals, out: &mut StepOutput) {
    let definition = Arc::clone(&actor.definition);
    let Some(state) = definition.state(actor.machine.current) else {
        return;
    };

    with_context(actor, 0.0, signals, out, |ctx| state.behavior.on_exit(ctx));
    resolve_cues(actor, &state.on_exit, out);
}

fn run_update(actor: &mut Actor, input: &StepInput, out: &mut StepOutput) {
    let definition = Arc::clone(&actor.definition);
    let Some(state) = definition.state(actor.machine.current) else {
        return;
    };

    with_context(actor, input.dt, input.signals, out, |ctx| state.behavior.update(ctx));
}

fn resolve_cues(actor: &mut Actor, specs: &[crate::effects::CueSpec], out: &mut StepOutput) {
    for spec in specs {
        let cue = spec.resolve(actor.kinematics.position, actor.facing, &mut actor.rng);
        out.cues.push(cue);
    }
}

/// Собрать StateContext из полей актора (disjoint borrows)
fn with_context<R>(
    actor: &mut Actor,
    dt: f32,
    signals: &Signals,
    out: &mut StepOutput,
    f: impl FnOnce(&mut StateContext) -> R,
) -> R {
    let mut ctx = StateContext {
        actor: actor.id,
        state: actor.machine.current,
        position: actor.kinematics.position,
        velocity: &mut actor.kinematics.velocity,
        facing: &mut actor.facing,
        health: actor.health,
        dt,
        time_in_state: actor.machine.time_in_state,
        speed_scale: actor.speed_scale,
        signals,
        last_hit: actor.last_hit.as_ref(),
        rng: &mut actor.rng,
        commands: &mut *out.commands,
        cues: &mut *out.cues,
        scratch: &mut actor.machine.scratch,
        done: &mut actor.machine.done,
    };
    f(&mut ctx)
}

