use thiserror::Error;

use crate::path::PathError;

#[derive(Debug, Error)]
pub enum ScenarioError {
  /// Structural problems that prevent the scenario from running.
  #[error("malformed scenario '{scenario_id}': {}", list(.problems))]
  Malformed {
    scenario_id: String,
    problems: Vec<Problem>,
  },

  #[error("failed to parse scenario document: {0}")]
  Parse(#[from] serde_json::Error),
}

/// A single structural defect found while loading a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Problem {
  #[error("initial phase '{phase}' does not exist")]
  MissingInitialPhase { phase: String },

  #[error("transition '{label}' in phase '{phase}' targets unknown phase '{target}'")]
  DanglingTransition {
    phase: String,
    label: String,
    target: String,
  },

  #[error("end phase '{phase}' declares {count} transition(s)")]
  EndPhaseHasTransitions { phase: String, count: usize },

  #[error("event id '{event_id}' is declared more than once")]
  DuplicateEventId { event_id: String },

  #[error("repeatable event '{event_id}' has a zero delay")]
  ZeroDelayRepeatable { event_id: String },

  #[error("{location}: {source}")]
  MalformedPath {
    location: String,
    #[source]
    source: PathError,
  },
}

fn list(problems: &[Problem]) -> String {
  problems
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
