//! Pure evaluation of condition trees.

use std::cmp::Ordering;

use codeblue_config::{Condition, Operator};
use codeblue_scenario::VarPath;
use serde_json::{Number, Value};

use crate::error::EvaluationError;
use crate::variables::{VariableStore, value_kind};

/// Evaluate `condition` against `variables`.
///
/// `elapsed_ms` feeds `time` leaves: time since phase entry for transition
/// guards, time since scenario start for scenario events.
///
/// Rules:
/// - `and` / `or` short-circuit left to right; empty `and` is true, empty
///   `or` is false.
/// - An undefined variable satisfies only `!=`.
/// - `==` / `!=` need both sides to be the same JSON type. Numbers compare
///   by value, so `1` equals `1.0`.
/// - Ordering operators need two numbers.
///
/// Anything else is an [`EvaluationError`].
pub fn evaluate(
  condition: &Condition,
  variables: &VariableStore,
  elapsed_ms: u64,
) -> Result<bool, EvaluationError> {
  match condition {
    Condition::Variable {
      variable,
      operator,
      value,
    } => {
      let path = VarPath::parse(variable)?;
      match variables.get(&path) {
        Some(stored) => compare(variable, stored, *operator, value),
        None => Ok(*operator == Operator::Ne),
      }
    }
    Condition::And { conditions } => {
      for condition in conditions {
        if !evaluate(condition, variables, elapsed_ms)? {
          return Ok(false);
        }
      }
      Ok(true)
    }
    Condition::Or { conditions } => {
      for condition in conditions {
        if evaluate(condition, variables, elapsed_ms)? {
          return Ok(true);
        }
      }
      Ok(false)
    }
    Condition::Time { elapsed } => Ok(elapsed_ms >= *elapsed),
  }
}

fn compare(
  variable: &str,
  stored: &Value,
  operator: Operator,
  literal: &Value,
) -> Result<bool, EvaluationError> {
  match (stored, literal) {
    (Value::Number(left), Value::Number(right)) => Ok(
      numeric_ordering(left, right).map_or(operator == Operator::Ne, |ord| holds(operator, ord)),
    ),
    (left, right) if !operator.is_ordering() && value_kind(left) == value_kind(right) => {
      let equal = left == right;
      Ok(if operator == Operator::Eq { equal } else { !equal })
    }
    (left, right) => Err(EvaluationError::IncompatibleTypes {
      variable: variable.to_string(),
      operator,
      left: value_kind(left),
      right: value_kind(right),
    }),
  }
}

fn numeric_ordering(left: &Number, right: &Number) -> Option<Ordering> {
  match (left.as_i64(), right.as_i64()) {
    (Some(l), Some(r)) => Some(l.cmp(&r)),
    _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
  }
}

fn holds(operator: Operator, ordering: Ordering) -> bool {
  match operator {
    Operator::Eq => ordering == Ordering::Equal,
    Operator::Ne => ordering != Ordering::Equal,
    Operator::Lt => ordering == Ordering::Less,
    Operator::Gt => ordering == Ordering::Greater,
    Operator::Le => ordering != Ordering::Greater,
    Operator::Ge => ordering != Ordering::Less,
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

  fn cond(value: Value) -> Condition {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_numeric_comparisons() {
    let v = vars(json!({ "heartRate": 140, "oxygenLevel": 92.5 }));

    assert!(evaluate(&Condition::variable("heartRate", Operator::Lt, 150), &v, 0).unwrap());
    assert!(!evaluate(&Condition::variable("heartRate", Operator::Gt, 150), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("heartRate", Operator::Le, 140), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("heartRate", Operator::Eq, 140.0), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("oxygenLevel", Operator::Ge, 92), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("oxygenLevel", Operator::Ne, 92), &v, 0).unwrap());
  }

  #[test]
  fn test_equality_on_strings_booleans_and_arrays() {
    let v = vars(json!({ "rhythm": "vfib", "treated": true, "meds": ["aspirin"] }));

    assert!(evaluate(&Condition::variable("rhythm", Operator::Eq, "vfib"), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("rhythm", Operator::Ne, "sinus"), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("treated", Operator::Eq, true), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("meds", Operator::Eq, json!(["aspirin"])), &v, 0).unwrap());
  }

  #[test]
  fn test_incompatible_types_are_errors() {
    let v = vars(json!({ "rhythm": "vfib", "heartRate": 180 }));

    let err = evaluate(&Condition::variable("rhythm", Operator::Lt, "x"), &v, 0).unwrap_err();
    assert_eq!(
      err,
      EvaluationError::IncompatibleTypes {
        variable: "rhythm".to_string(),
        operator: Operator::Lt,
        left: "string",
        right: "string",
      }
    );

    let err = evaluate(&Condition::variable("heartRate", Operator::Eq, "180"), &v, 0).unwrap_err();
    assert!(matches!(err, EvaluationError::IncompatibleTypes { right: "string", .. }));
  }

  #[test]
  fn test_missing_variable_only_satisfies_not_equal() {
    let v = VariableStore::default();

    assert!(!evaluate(&Condition::variable("absent", Operator::Eq, 1), &v, 0).unwrap());
    assert!(!evaluate(&Condition::variable("absent", Operator::Lt, 1), &v, 0).unwrap());
    assert!(evaluate(&Condition::variable("absent", Operator::Ne, 1), &v, 0).unwrap());
  }

  #[test]
  fn test_and_or_short_circuit() {
    let v = vars(json!({ "rhythm": "vfib", "heartRate": 180 }));

    // The second operand would be an error if it were evaluated.
    let and = cond(json!({ "type": "and", "conditions": [
      { "type": "variable", "variable": "heartRate", "operator": "<", "value": 100 },
      { "type": "variable", "variable": "rhythm", "operator": "<", "value": 1 }
    ]}));
    assert!(!evaluate(&and, &v, 0).unwrap());

    let or = cond(json!({ "type": "or", "conditions": [
      { "type": "variable", "variable": "heartRate", "operator": ">", "value": 100 },
      { "type": "variable", "variable": "rhythm", "operator": "<", "value": 1 }
    ]}));
    assert!(evaluate(&or, &v, 0).unwrap());

    assert!(evaluate(&cond(json!({ "type": "and", "conditions": [] })), &v, 0).unwrap());
    assert!(!evaluate(&cond(json!({ "type": "or", "conditions": [] })), &v, 0).unwrap());
  }

  #[test]
  fn test_time_condition_is_inclusive() {
    let v = VariableStore::default();
    let after_minute = Condition::Time { elapsed: 60_000 };

    assert!(!evaluate(&after_minute, &v, 59_999).unwrap());
    assert!(evaluate(&after_minute, &v, 60_000).unwrap());
    assert!(evaluate(&after_minute, &v, 61_000).unwrap());
  }

  #[test]
  fn test_evaluation_does_not_mutate() {
    let v = vars(json!({ "heartRate": 140 }));
    let before = v.clone();
    let _ = evaluate(&Condition::variable("missing.path", Operator::Eq, 1), &v, 0).unwrap();
    assert_eq!(v, before);
  }
}
