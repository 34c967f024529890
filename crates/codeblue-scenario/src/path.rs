//! Dotted variable paths such as `currentStaffing.vets`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
  #[error("variable path is empty")]
  Empty,

  #[error("variable path '{path}' has an empty segment")]
  EmptySegment { path: String },
}

/// A parsed variable path. Always has at least one non-empty segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
  segments: Vec<String>,
}

impl VarPath {
  pub fn parse(path: &str) -> Result<Self, PathError> {
    if path.is_empty() {
      return Err(PathError::Empty);
    }

    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
      return Err(PathError::EmptySegment {
        path: path.to_string(),
      });
    }

    Ok(Self { segments })
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }

  /// Parent segments and the final key.
  pub fn split_last(&self) -> (&[String], &str) {
    match self.segments.split_last() {
      Some((last, parents)) => (parents, last.as_str()),
      None => (&[], ""),
    }
  }
}

impl FromStr for VarPath {
  type Err = PathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for VarPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.segments.join("."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_nested_path() {
    let path = VarPath::parse("currentStaffing.vets").unwrap();
    assert_eq!(path.segments(), ["currentStaffing", "vets"]);
    let (parents, last) = path.split_last();
    assert_eq!(parents, ["currentStaffing"]);
    assert_eq!(last, "vets");
    assert_eq!(path.to_string(), "currentStaffing.vets");
  }

  #[test]
  fn test_reject_malformed_paths() {
    assert_eq!(VarPath::parse(""), Err(PathError::Empty));
    for bad in ["a..b", ".a", "a."] {
      assert_eq!(
        VarPath::parse(bad),
        Err(PathError::EmptySegment {
          path: bad.to_string()
        })
      );
    }
  }
}
