//! Guard expressions over scenario variables and elapsed time.
//!
//! Conditions are trees. Leaves compare a variable against a literal or test
//! elapsed time; `and` / `or` nodes combine sub-conditions.
//!
//! ```json
//! {
//!   "type": "and",
//!   "conditions": [
//!     { "type": "variable", "variable": "heartRate", "operator": "<", "value": 150 },
//!     { "type": "variable", "variable": "oxygenLevel", "operator": ">", "value": 90 }
//!   ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
  /// Compare the value stored at `variable` (a dotted path) with `value`.
  Variable {
    variable: String,
    operator: Operator,
    value: serde_json::Value,
  },
  And {
    conditions: Vec<Condition>,
  },
  Or {
    conditions: Vec<Condition>,
  },
  /// True once at least `elapsed` milliseconds have passed.
  Time {
    elapsed: u64,
  },
}

impl Condition {
  /// Build a variable comparison leaf.
  pub fn variable(
    variable: impl Into<String>,
    operator: Operator,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    Self::Variable {
      variable: variable.into(),
      operator,
      value: value.into(),
    }
  }

  /// Visit every variable path referenced by this condition, depth first.
  pub fn for_each_variable<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
    match self {
      Condition::Variable { variable, .. } => f(variable),
      Condition::And { conditions } | Condition::Or { conditions } => {
        for condition in conditions {
          condition.for_each_variable(f);
        }
      }
      Condition::Time { .. } => {}
    }
  }
}

/// Comparison operator in a variable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
  #[serde(rename = "==")]
  Eq,
  #[serde(rename = "!=")]
  Ne,
  #[serde(rename = "<")]
  Lt,
  #[serde(rename = ">")]
  Gt,
  #[serde(rename = "<=")]
  Le,
  #[serde(rename = ">=")]
  Ge,
}

impl Operator {
  /// Whether the operator needs an ordering rather than plain equality.
  pub fn is_ordering(self) -> bool {
    matches!(self, Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge)
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Operator::Eq => "==",
      Operator::Ne => "!=",
      Operator::Lt => "<",
      Operator::Gt => ">",
      Operator::Le => "<=",
      Operator::Ge => ">=",
    }
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_nested_condition_parses() {
    let condition: Condition = serde_json::from_value(json!({
      "type": "and",
      "conditions": [
        { "type": "variable", "variable": "heartRate", "operator": "<", "value": 150 },
        { "type": "or", "conditions": [
          { "type": "time", "elapsed": 30000 },
          { "type": "variable", "variable": "staff.vets", "operator": ">=", "value": 2 }
        ]}
      ]
    }))
    .unwrap();

    let mut seen = Vec::new();
    condition.for_each_variable(&mut |path| seen.push(path.to_string()));
    assert_eq!(seen, vec!["heartRate", "staff.vets"]);
  }

  #[test]
  fn test_operator_symbols() {
    let op: Operator = serde_json::from_value(json!("<=")).unwrap();
    assert_eq!(op, Operator::Le);
    assert!(op.is_ordering());
    assert!(!Operator::Ne.is_ordering());
    assert_eq!(serde_json::to_value(Operator::Ne).unwrap(), json!("!="));
  }

  #[test]
  fn test_unknown_operator_is_rejected() {
    let result: Result<Condition, _> = serde_json::from_value(json!({
      "type": "variable", "variable": "x", "operator": "~=", "value": 1
    }));
    assert!(result.is_err());
  }
}
