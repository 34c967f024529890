use std::collections::{BTreeMap, BTreeSet, VecDeque};

use codeblue_config::PhaseDef;

/// Phase graph for traversal and analysis.
#[derive(Debug, Clone)]
pub struct PhaseGraph {
  /// Adjacency list: phase -> target phases, in declaration order.
  adjacency: BTreeMap<String, Vec<String>>,
  /// Reverse adjacency: phase -> phases with a transition into it.
  reverse_adjacency: BTreeMap<String, Vec<String>>,
  /// Phases marked `isEnd`.
  end_phases: BTreeSet<String>,
}

impl PhaseGraph {
  /// Build a graph from phase definitions.
  ///
  /// Transitions to phases that do not exist are ignored; validation reports
  /// them separately.
  pub fn new(phases: &BTreeMap<String, PhaseDef>) -> Self {
    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut reverse_adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for key in phases.keys() {
      adjacency.entry(key.clone()).or_default();
      reverse_adjacency.entry(key.clone()).or_default();
    }

    for (key, phase) in phases {
      for transition in &phase.transitions {
        if !phases.contains_key(&transition.to) {
          continue;
        }
        let targets = adjacency.entry(key.clone()).or_default();
        if !targets.contains(&transition.to) {
          targets.push(transition.to.clone());
        }
        let sources = reverse_adjacency.entry(transition.to.clone()).or_default();
        if !sources.contains(key) {
          sources.push(key.clone());
        }
      }
    }

    let end_phases = phases
      .iter()
      .filter(|(_, phase)| phase.is_end)
      .map(|(key, _)| key.clone())
      .collect();

    Self {
      adjacency,
      reverse_adjacency,
      end_phases,
    }
  }

  /// Phases reachable in one transition from `phase`.
  pub fn downstream(&self, phase: &str) -> &[String] {
    self
      .adjacency
      .get(phase)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Phases with a transition into `phase`.
  pub fn upstream(&self, phase: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(phase)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn has_edge(&self, from: &str, to: &str) -> bool {
    self.downstream(from).iter().any(|target| target == to)
  }

  pub fn is_end(&self, phase: &str) -> bool {
    self.end_phases.contains(phase)
  }

  pub fn end_phases(&self) -> &BTreeSet<String> {
    &self.end_phases
  }

  /// Every phase reachable from `start`, including `start` itself.
  pub fn reachable_from(&self, start: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    if !self.adjacency.contains_key(start) {
      return seen;
    }

    let mut queue = VecDeque::from([start.to_string()]);
    seen.insert(start.to_string());
    while let Some(phase) = queue.pop_front() {
      for next in self.downstream(&phase) {
        if seen.insert(next.clone()) {
          queue.push_back(next.clone());
        }
      }
    }
    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn phases(value: serde_json::Value) -> BTreeMap<String, PhaseDef> {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_adjacency_and_reachability() {
    let graph = PhaseGraph::new(&phases(json!({
      "a": { "transitions": [
        { "to": "b", "label": "go b" },
        { "to": "b", "label": "also b" },
        { "to": "ghost", "label": "nowhere" }
      ]},
      "b": { "transitions": [{ "to": "end", "label": "finish" }] },
      "island": { "transitions": [{ "to": "end", "label": "finish" }] },
      "end": { "isEnd": true }
    })));

    assert_eq!(graph.downstream("a"), ["b"]);
    assert_eq!(graph.upstream("end"), ["b", "island"]);
    assert!(graph.has_edge("b", "end"));
    assert!(!graph.has_edge("a", "ghost"));
    assert!(graph.is_end("end"));

    let reachable = graph.reachable_from("a");
    assert!(reachable.contains("end"));
    assert!(!reachable.contains("island"));
    assert!(graph.reachable_from("missing").is_empty());
  }
}
