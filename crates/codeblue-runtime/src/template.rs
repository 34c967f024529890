//! Payload rendering using minijinja templates.
//!
//! String leaves of an `emit` payload may reference variables:
//!
//! ```json
//! { "message": "Heart rate is {{ heartRate }}", "vets": "{{ currentStaffing.vets }}" }
//! ```
//!
//! Only strings containing template markers are rendered; every other value
//! passes through untouched, so payloads without templates keep their exact
//! types.

use minijinja::Environment;
use serde_json::Value;

use crate::variables::VariableStore;

/// Render every templated string in `payload` against `variables`.
pub fn render_payload(payload: &Value, variables: &VariableStore) -> Result<Value, minijinja::Error> {
  if !contains_template(payload) {
    return Ok(payload.clone());
  }

  let env = Environment::new();
  let context = minijinja::Value::from_serialize(variables.as_map());
  render_value(&env, payload, &context)
}

fn render_value(
  env: &Environment,
  value: &Value,
  context: &minijinja::Value,
) -> Result<Value, minijinja::Error> {
  match value {
    Value::String(text) if is_template(text) => {
      env.render_str(text, context.clone()).map(Value::String)
    }
    Value::Array(items) => items
      .iter()
      .map(|item| render_value(env, item, context))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    Value::Object(fields) => {
      let mut rendered = serde_json::Map::new();
      for (key, field) in fields {
        rendered.insert(key.clone(), render_value(env, field, context)?);
      }
      Ok(Value::Object(rendered))
    }
    other => Ok(other.clone()),
  }
}

fn is_template(text: &str) -> bool {
  text.contains("{{") || text.contains("{%")
}

fn contains_template(value: &Value) -> bool {
  match value {
    Value::String(text) => is_template(text),
    Value::Array(items) => items.iter().any(contains_template),
    Value::Object(fields) => fields.values().any(contains_template),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn vars(value: Value) -> VariableStore {
    match value {
      Value::Object(map) => VariableStore::new(map),
      _ => panic!("variables fixture must be an object"),
    }
  }

  #[test]
  fn test_render_nested_strings() {
    let v = vars(json!({ "heartRate": 180, "currentStaffing": { "vets": 2 } }));
    let payload = json!({
      "message": "HR {{ heartRate }}",
      "details": ["{{ currentStaffing.vets }} vets on shift", 7],
      "level": "critical"
    });

    let rendered = render_payload(&payload, &v).unwrap();
    assert_eq!(
      rendered,
      json!({
        "message": "HR 180",
        "details": ["2 vets on shift", 7],
        "level": "critical"
      })
    );
  }

  #[test]
  fn test_plain_payload_untouched() {
    let payload = json!({ "count": 3, "ok": true, "note": "no braces" });
    let rendered = render_payload(&payload, &VariableStore::default()).unwrap();
    assert_eq!(rendered, payload);
  }

  #[test]
  fn test_syntax_error_is_reported() {
    let payload = json!("{{ heartRate ");
    assert!(render_payload(&payload, &VariableStore::default()).is_err());
  }
}
