//! Codeblue Config
//!
//! This crate contains the serializable scenario document types for codeblue.
//! These types represent a clinical training scenario as authored, before it is
//! validated and loaded by the runtime.
//!
//! Documents can be loaded from:
//! - JSON files (via CLI with `codeblue run scenario.json`)
//! - Any other serde format that round-trips through these types
//!
//! The `codeblue-scenario` crate takes these types, validates the phase graph,
//! and produces a locked scenario ready to run.

mod action;
mod condition;
mod event;
mod phase;
mod scenario;

pub use action::{Action, Emit, SetVariable, StartTimer, StopTimer, UnrecognizedAction};
pub use condition::{Condition, Operator};
pub use event::{EventDef, EventKind};
pub use phase::{PhaseDef, TransitionDef};
pub use scenario::ScenarioDef;
