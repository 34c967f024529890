//! Engine error types.

use codeblue_config::Operator;
use codeblue_scenario::{PathError, ScenarioError};
use thiserror::Error;

use crate::variables::VariableError;

/// Errors raised by the scenario engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The document failed structural validation. Fatal.
  #[error(transparent)]
  MalformedScenario(#[from] ScenarioError),

  /// No transition with this label exists in the current phase.
  #[error("no transition labeled '{label}' in phase '{phase}'")]
  InvalidTransition { phase: String, label: String },

  /// The transition exists but its guard is currently false.
  #[error("transition '{label}' in phase '{phase}' is not eligible")]
  TransitionNotEligible { phase: String, label: String },

  /// The instance reached an end phase; no further transitions are accepted.
  #[error("scenario ended in phase '{phase}'; cannot take transition '{label}'")]
  ScenarioEnded { phase: String, label: String },

  /// A condition compared incompatible values.
  #[error("condition failed in {origin}: {source}")]
  Evaluation {
    origin: String,
    #[source]
    source: EvaluationError,
  },

  #[error("{origin}: unknown action type '{kind}'")]
  UnknownAction { origin: String, kind: String },

  #[error("{origin}: {source}")]
  Variable {
    origin: String,
    #[source]
    source: VariableError,
  },

  #[error("{origin}: failed to render payload for event '{event}': {message}")]
  Template {
    origin: String,
    event: String,
    message: String,
  },

  #[error("phase '{phase}' is not defined")]
  UnknownPhase { phase: String },

  /// Armed work referred to something that is not a timed event.
  #[error("event '{event}' is not a timed event of this scenario")]
  UnknownEvent { event: String },

  /// More than the configured limit of timers and events came due at one
  /// instant, e.g. a zero-duration timer that keeps restarting itself.
  #[error("more than {limit} timers and events fired at {at}ms")]
  RunawayScheduler { at: u64, limit: usize },
}

impl EngineError {
  /// Whether the caller can carry on with the same instance, for example by
  /// re-prompting the operator.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      EngineError::InvalidTransition { .. }
        | EngineError::TransitionNotEligible { .. }
        | EngineError::ScenarioEnded { .. }
    )
  }
}

/// Errors from evaluating a condition tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
  #[error("cannot evaluate '{variable}' ({left}) {operator} {right}")]
  IncompatibleTypes {
    variable: String,
    operator: Operator,
    left: &'static str,
    right: &'static str,
  },

  #[error(transparent)]
  Path(#[from] PathError),
}
