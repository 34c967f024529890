use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::EventDef;
use crate::phase::PhaseDef;

/// A scenario document as authored.
///
/// Phases are keyed by their phase key. A `BTreeMap` keeps iteration order
/// stable so validation reports and lints come out in the same order on
/// every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDef {
  pub id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub initial_phase: String,
  #[serde(default)]
  pub initial_variables: serde_json::Map<String, serde_json::Value>,
  pub phases: BTreeMap<String, PhaseDef>,
  #[serde(default)]
  pub events: Vec<EventDef>,
  /// Advisory sequence of phase keys. Carried as metadata only.
  #[serde(default)]
  pub optimal_path: Vec<String>,
}

impl ScenarioDef {
  /// Parse a scenario document from JSON text.
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }
}
