//! AI decision-making module
//!
//! Per-actor FSM: таблица states (StateDefinition) на тип актора,
//! behaviors как update функции, приоритетные переходы в `machine`.
//! Bevy здесь не нужен: FSM крутит encounter director внутри FixedUpdate.

pub mod behavior;
pub mod definition;
pub mod machine;
pub mod presets;
pub mod state;


// Re-export основных типов
pub use behavior::{ActorCommand, Behavior, BehaviorScratch, Signals, StateBehavior, StateContext};
pub use definition::{ActorDefinition, BodySetup, DefinitionRegistry, PhaseRule};
pub use machine::{start_actor, step_actor, StateMachine, StepInput, StepOutput, Transition, TransitionCause};
pub use state::{NextState, SensorRule, SensorTrigger, StateDefinition, StateKind};
