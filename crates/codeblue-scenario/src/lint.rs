//! Authoring lints: defects that do not stop a scenario from running.

use std::fmt;

use serde::Serialize;

/// Serialized tagged on `kind`, e.g. `{ "kind": "deadEndPhase", "phase": "triage" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Lint {
  /// Non-end phase without transitions; a run entering it can never progress.
  DeadEndPhase { phase: String },
  UnreachablePhase { phase: String },
  /// Two transitions in one phase share a label. Requests take the first.
  DuplicateLabel { phase: String, label: String },
  UnknownOptimalPathPhase { phase: String },
  /// Consecutive optimal path entries with no transition between them.
  OptimalPathGap { from: String, to: String },
}

impl fmt::Display for Lint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Lint::DeadEndPhase { phase } => {
        write!(f, "phase '{phase}' is not an end phase but has no transitions")
      }
      Lint::UnreachablePhase { phase } => {
        write!(f, "phase '{phase}' is unreachable from the initial phase")
      }
      Lint::DuplicateLabel { phase, label } => {
        write!(f, "phase '{phase}' declares label '{label}' more than once")
      }
      Lint::UnknownOptimalPathPhase { phase } => {
        write!(f, "optimal path names unknown phase '{phase}'")
      }
      Lint::OptimalPathGap { from, to } => {
        write!(f, "optimal path step '{from}' -> '{to}' has no transition")
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_lints_serialize_with_kind_tag() {
    let lints = vec![
      Lint::DeadEndPhase {
        phase: "triage".to_string(),
      },
      Lint::OptimalPathGap {
        from: "arrival".to_string(),
        to: "recovery".to_string(),
      },
    ];

    assert_eq!(
      serde_json::to_value(&lints).unwrap(),
      json!([
        { "kind": "deadEndPhase", "phase": "triage" },
        { "kind": "optimalPathGap", "from": "arrival", "to": "recovery" }
      ])
    );
    assert_eq!(
      lints[1].to_string(),
      "optimal path step 'arrival' -> 'recovery' has no transition"
    );
  }
}
