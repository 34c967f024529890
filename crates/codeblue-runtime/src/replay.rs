//! Scripted sessions: a recorded sequence of caller inputs.
//!
//! Because the engine reads no wall clock, replaying the same steps against
//! the same document always reproduces the same phase and variables.
//!
//! ```json
//! [
//!   { "step": "transition", "label": "Skip Triage - Direct to Treatment" },
//!   { "step": "tick", "at": 30000 },
//!   { "step": "transition", "label": "Begin Stabilization" }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{ScenarioEngine, TickReport, TransitionRecord};
use crate::error::EngineError;
use crate::observer::Observer;

/// One caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
  Transition { label: String },
  Tick { at: u64 },
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum StepOutcome {
  Transition(TransitionRecord),
  Tick(TickReport),
}

#[derive(Debug, Error)]
#[error("step {index} ({step:?}) failed: {source}")]
pub struct ReplayError {
  pub index: usize,
  pub step: Step,
  #[source]
  pub source: EngineError,
}

impl<O: Observer> ScenarioEngine<O> {
  /// Apply a single step.
  pub fn apply(&mut self, step: &Step) -> Result<StepOutcome, EngineError> {
    match step {
      Step::Transition { label } => self.request_transition(label).map(StepOutcome::Transition),
      Step::Tick { at } => self.tick(*at).map(StepOutcome::Tick),
    }
  }
}

/// Apply `steps` in order, stopping at the first failure.
///
/// On failure the engine keeps whatever state the earlier steps produced.
pub fn replay<O: Observer>(
  engine: &mut ScenarioEngine<O>,
  steps: &[Step],
) -> Result<Vec<StepOutcome>, ReplayError> {
  let mut outcomes = Vec::with_capacity(steps.len());
  for (index, step) in steps.iter().enumerate() {
    let outcome = engine.apply(step).map_err(|source| ReplayError {
      index,
      step: step.clone(),
      source,
    })?;
    outcomes.push(outcome);
  }
  Ok(outcomes)
}
