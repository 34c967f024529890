//! The mutable variable store of one scenario instance.
//!
//! Variables form a tree: objects are interior nodes, everything else is a
//! leaf. Dotted paths address nodes (`currentStaffing.vets`). Values keep the
//! JSON type they were written with; nothing is coerced.

use codeblue_scenario::{PathError, VarPath};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariableError {
  #[error(transparent)]
  Path(#[from] PathError),

  #[error("cannot set '{path}': '{segment}' holds a {kind}, not an object")]
  NotAnObject {
    path: String,
    segment: String,
    kind: &'static str,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VariableStore {
  root: Map<String, Value>,
}

impl VariableStore {
  pub fn new(initial: Map<String, Value>) -> Self {
    Self { root: initial }
  }

  /// Resolve a path. Missing keys and paths that run through a leaf are `None`.
  pub fn get(&self, path: &VarPath) -> Option<&Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut node = self.root.get(first)?;
    for segment in rest {
      node = node.as_object()?.get(segment)?;
    }
    Some(node)
  }

  /// Parse `path` and resolve it.
  pub fn lookup(&self, path: &str) -> Result<Option<&Value>, VariableError> {
    Ok(self.get(&VarPath::parse(path)?))
  }

  /// Write `value` at `path`, creating intermediate objects as needed.
  ///
  /// Returns the previous value. Fails if an intermediate segment already
  /// holds a non-object value; existing leaves are never replaced by objects.
  pub fn set(&mut self, path: &VarPath, value: Value) -> Result<Option<Value>, VariableError> {
    let (parents, last) = path.split_last();
    let mut node = &mut self.root;
    for segment in parents {
      let child = node
        .entry(segment.clone())
        .or_insert_with(|| Value::Object(Map::new()));
      node = match child {
        Value::Object(map) => map,
        other => {
          return Err(VariableError::NotAnObject {
            path: path.to_string(),
            segment: segment.clone(),
            kind: value_kind(other),
          });
        }
      };
    }
    Ok(node.insert(last.to_string(), value))
  }

  /// Parse `path` and write to it.
  pub fn assign(&mut self, path: &str, value: Value) -> Result<Option<Value>, VariableError> {
    self.set(&VarPath::parse(path)?, value)
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.root
  }

  pub fn to_value(&self) -> Value {
    Value::Object(self.root.clone())
  }
}

/// Name of a value's JSON type, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
