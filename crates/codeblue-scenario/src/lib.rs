//! Codeblue Scenario
//!
//! This crate provides the validated scenario representation for codeblue.
//! A [`Scenario`] is a checked form of a [`ScenarioDef`](codeblue_config::ScenarioDef)
//! that is ready to be run by the engine.
//!
//! Key differences from `codeblue-config`:
//! - Every transition target and the initial phase are known to exist
//! - Variable paths are syntactically valid
//! - End phases have no outgoing transitions
//! - The phase graph is analysed for dead ends and unreachable phases

mod error;
mod graph;
mod lint;
mod path;
mod scenario;

pub use error::{Problem, ScenarioError};
pub use graph::PhaseGraph;
pub use lint::Lint;
pub use path::{PathError, VarPath};
pub use scenario::Scenario;
