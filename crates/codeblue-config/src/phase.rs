use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::Condition;

/// A named state of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDef {
  #[serde(default)]
  pub description: String,
  /// Actions run, in order, every time the phase is entered.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub on_enter: Vec<Action>,
  #[serde(default)]
  pub transitions: Vec<TransitionDef>,
  #[serde(default)]
  pub is_end: bool,
}

/// A guarded, labeled edge to another phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDef {
  /// Target phase key.
  pub to: String,
  /// Display text; also the key callers use to request the transition.
  pub label: String,
  /// Guard. Absent means always eligible.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<Condition>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}
