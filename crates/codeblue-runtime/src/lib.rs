//! Codeblue Runtime
//!
//! This crate runs validated scenarios. A [`ScenarioEngine`] owns exactly one
//! running instance: its current phase, variable store, pending timers and
//! fired events.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioEngine                         │
//! │  - start / request_transition / tick                        │
//! │  - phase entry, eligibility, conditional events             │
//! └─────────────────────────────────────────────────────────────┘
//!          │                     │                     │
//!          ▼                     ▼                     ▼
//! ┌─────────────────┐  ┌───────────────────┐  ┌─────────────────┐
//! │ ActionExecutor  │  │    Scheduler      │  │   condition     │
//! │ set/emit/timers │  │ timers + timed    │  │ pure evaluation │
//! └─────────────────┘  │ events, ordering  │  └─────────────────┘
//!          │           └───────────────────┘           │
//!          ▼                                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      VariableStore                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Time only moves when the caller calls [`ScenarioEngine::tick`]. The engine
//! never reads a wall clock, so identical call sequences produce identical
//! state.
//!
//! # Usage
//!
//! ```ignore
//! use codeblue_runtime::ScenarioEngine;
//!
//! let mut engine = ScenarioEngine::start(document, 0)?;
//! for transition in engine.eligible_transitions()? {
//!     println!("{}", transition.label);
//! }
//! engine.request_transition("Begin Triage")?;
//! engine.tick(30_000)?;
//! ```

mod action;
mod condition;
mod engine;
mod error;
mod observer;
mod replay;
mod scheduler;
mod template;
mod variables;

pub use action::ActionSource;
pub use condition::evaluate;
pub use engine::{
  EngineConfig, InstanceSnapshot, PhaseVisit, ScenarioEngine, TickReport, TransitionRecord,
};
pub use error::{EngineError, EvaluationError};
pub use observer::{ChannelObserver, EngineEvent, EventBus, NoopObserver, Observer};
pub use replay::{ReplayError, Step, StepOutcome, replay};
pub use scheduler::{PendingTimer, Scheduler};
pub use variables::{VariableError, VariableStore};
