use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::Condition;

/// A scenario-level trigger that runs independently of phase transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
  pub id: String,
  #[serde(flatten)]
  pub kind: EventKind,
  #[serde(default)]
  pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
  /// Fires `delay` ms after scenario start. Repeatable events re-arm
  /// `delay` ms after each firing.
  Timed {
    delay: u64,
    #[serde(default)]
    repeatable: bool,
    /// Checked at fire time; a false condition skips this firing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
  },
  /// Fires once, the first time `condition` holds after a state change.
  Conditional { condition: Condition },
}

impl EventDef {
  pub fn condition(&self) -> Option<&Condition> {
    match &self.kind {
      EventKind::Timed { condition, .. } => condition.as_ref(),
      EventKind::Conditional { condition } => Some(condition),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_timed_event_defaults() {
    let event: EventDef = serde_json::from_value(json!({
      "id": "family-arrives",
      "type": "timed",
      "delay": 120000,
      "actions": [{ "type": "emit", "event": "family" }]
    }))
    .unwrap();

    assert_eq!(
      event.kind,
      EventKind::Timed {
        delay: 120000,
        repeatable: false,
        condition: None,
      }
    );
    assert!(event.condition().is_none());
    assert_eq!(event.actions.len(), 1);
  }

  #[test]
  fn test_conditional_event_requires_condition() {
    let result: Result<EventDef, _> = serde_json::from_value(json!({
      "id": "crash",
      "type": "conditional",
      "actions": []
    }));
    assert!(result.is_err());
  }
}
