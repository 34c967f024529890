//! Declarative effects run on phase entry, by timers and by scenario events.
//!
//! Actions are tagged on `type`:
//!
//! ```json
//! [
//!   { "type": "setVariable", "variable": "treatmentStarted", "value": true },
//!   { "type": "emit", "event": "alarm", "payload": { "level": "critical" } },
//!   { "type": "startTimer", "name": "deterioration", "duration": 60000, "callback": [] },
//!   { "type": "stopTimer", "name": "deterioration" }
//! ]
//! ```
//!
//! Tags this crate does not know are kept as [`Action::Unrecognized`] with
//! their raw body, so documents still round-trip. The runtime refuses to
//! execute them.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

const TAG: &str = "type";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  SetVariable(SetVariable),
  Emit(Emit),
  StartTimer(StartTimer),
  StopTimer(StopTimer),
  Unrecognized(UnrecognizedAction),
}

/// Write `value` at the dotted path `variable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetVariable {
  #[serde(alias = "name")]
  pub variable: String,
  pub value: Value,
}

/// Publish `payload` to observers under `event`.
///
/// When the engine renders payloads, string leaves containing `{{ ... }}`
/// are replaced by the rendered text, so `"{{ heartRate }}"` publishes the
/// string `"180"`, not the number. Other leaves are published as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emit {
  pub event: String,
  #[serde(default)]
  pub payload: Value,
}

/// Register a phase-scoped timer that runs `callback` after `duration` ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTimer {
  pub name: String,
  pub duration: u64,
  #[serde(default)]
  pub callback: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTimer {
  pub name: String,
}

/// An action whose `type` tag is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedAction {
  pub kind: String,
  /// Remaining fields, without the tag.
  pub body: Map<String, Value>,
}

impl Action {
  pub fn set(variable: impl Into<String>, value: impl Into<Value>) -> Self {
    Action::SetVariable(SetVariable {
      variable: variable.into(),
      value: value.into(),
    })
  }

  pub fn emit(event: impl Into<String>, payload: Value) -> Self {
    Action::Emit(Emit {
      event: event.into(),
      payload,
    })
  }

  pub fn start_timer(name: impl Into<String>, duration: u64, callback: Vec<Action>) -> Self {
    Action::StartTimer(StartTimer {
      name: name.into(),
      duration,
      callback,
    })
  }

  pub fn stop_timer(name: impl Into<String>) -> Self {
    Action::StopTimer(StopTimer { name: name.into() })
  }

  /// The `type` tag this action serializes with.
  pub fn kind(&self) -> &str {
    match self {
      Action::SetVariable(_) => "setVariable",
      Action::Emit(_) => "emit",
      Action::StartTimer(_) => "startTimer",
      Action::StopTimer(_) => "stopTimer",
      Action::Unrecognized(action) => &action.kind,
    }
  }
}

impl<'de> Deserialize<'de> for Action {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut body = Map::<String, Value>::deserialize(deserializer)?;
    let kind = match body.remove(TAG) {
      Some(Value::String(kind)) => kind,
      Some(other) => {
        return Err(D::Error::custom(format!(
          "action `{TAG}` must be a string, got {other}"
        )));
      }
      None => return Err(D::Error::missing_field(TAG)),
    };

    let body = Value::Object(body);
    let parsed = match kind.as_str() {
      "setVariable" => SetVariable::deserialize(body).map(Action::SetVariable),
      "emit" => Emit::deserialize(body).map(Action::Emit),
      "startTimer" => StartTimer::deserialize(body).map(Action::StartTimer),
      "stopTimer" => StopTimer::deserialize(body).map(Action::StopTimer),
      _ => {
        let body = match body {
          Value::Object(body) => body,
          _ => Map::new(),
        };
        return Ok(Action::Unrecognized(UnrecognizedAction { kind, body }));
      }
    };

    parsed.map_err(|e| D::Error::custom(format!("invalid `{kind}` action: {e}")))
  }
}

impl Serialize for Action {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let body = match self {
      Action::SetVariable(action) => serde_json::to_value(action),
      Action::Emit(action) => serde_json::to_value(action),
      Action::StartTimer(action) => serde_json::to_value(action),
      Action::StopTimer(action) => serde_json::to_value(action),
      Action::Unrecognized(action) => Ok(Value::Object(action.body.clone())),
    }
    .map_err(S::Error::custom)?;

    let mut body = match body {
      Value::Object(body) => body,
      other => {
        return Err(S::Error::custom(format!(
          "action body must be an object, got {other}"
        )));
      }
    };
    body.insert(TAG.to_string(), Value::String(self.kind().to_string()));
    body.serialize(serializer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_known_actions_parse() {
    let actions: Vec<Action> = serde_json::from_value(json!([
      { "type": "setVariable", "variable": "currentStaffing.vets", "value": 2 },
      { "type": "setVariable", "name": "treatmentStarted", "value": true },
      { "type": "emit", "event": "alarm" },
      { "type": "startTimer", "name": "t", "duration": 500,
        "callback": [{ "type": "stopTimer", "name": "other" }] }
    ]))
    .unwrap();

    assert_eq!(actions[0], Action::set("currentStaffing.vets", 2));
    assert_eq!(actions[1], Action::set("treatmentStarted", true));
    assert_eq!(actions[2], Action::emit("alarm", Value::Null));
    assert_eq!(
      actions[3],
      Action::start_timer("t", 500, vec![Action::stop_timer("other")])
    );
  }

  #[test]
  fn test_unrecognized_action_is_preserved() {
    let raw = json!({ "type": "playSound", "file": "beep.wav", "loop": false });
    let action: Action = serde_json::from_value(raw.clone()).unwrap();

    match &action {
      Action::Unrecognized(unknown) => {
        assert_eq!(unknown.kind, "playSound");
        assert_eq!(unknown.body["file"], "beep.wav");
        assert!(!unknown.body.contains_key("type"));
      }
      other => panic!("expected unrecognized action, got {other:?}"),
    }
    assert_eq!(action.kind(), "playSound");
    assert_eq!(serde_json::to_value(&action).unwrap(), raw);
  }

  #[test]
  fn test_malformed_known_action_is_an_error() {
    let result: Result<Action, _> =
      serde_json::from_value(json!({ "type": "startTimer", "name": "t" }));
    let err = result.unwrap_err().to_string();
    assert!(err.contains("startTimer"), "{err}");
  }

  #[test]
  fn test_missing_tag_is_an_error() {
    let result: Result<Action, _> = serde_json::from_value(json!({ "name": "t" }));
    assert!(result.is_err());
  }

  #[test]
  fn test_serialize_includes_tag() {
    let value = serde_json::to_value(Action::stop_timer("alarm")).unwrap();
    assert_eq!(value, json!({ "type": "stopTimer", "name": "alarm" }));
  }
}
