use std::collections::{BTreeMap, BTreeSet};

use codeblue_config::{Action, EventDef, EventKind, PhaseDef, ScenarioDef};
use tracing::{debug, warn};

use crate::error::{Problem, ScenarioError};
use crate::graph::PhaseGraph;
use crate::lint::Lint;
use crate::path::VarPath;

/// A validated scenario ready to run.
///
/// Construction goes through [`Scenario::load`], which rejects documents with
/// dangling phase references and similar structural defects. Accessors hand
/// out the underlying definitions read-only.
#[derive(Debug, Clone)]
pub struct Scenario {
  def: ScenarioDef,
  graph: PhaseGraph,
  lints: Vec<Lint>,
}

impl Scenario {
  /// Validate a scenario definition.
  ///
  /// All problems are collected before failing, so a single load reports
  /// every dangling reference in the document.
  pub fn load(def: ScenarioDef) -> Result<Self, ScenarioError> {
    let problems = validate(&def);
    if !problems.is_empty() {
      return Err(ScenarioError::Malformed {
        scenario_id: def.id,
        problems,
      });
    }

    let graph = PhaseGraph::new(&def.phases);
    let lints = lint(&def, &graph);
    for lint in &lints {
      warn!(scenario_id = %def.id, lint = %lint, "scenario_lint");
    }
    debug!(
      scenario_id = %def.id,
      phases = def.phases.len(),
      events = def.events.len(),
      "scenario_loaded"
    );

    Ok(Self { def, graph, lints })
  }

  /// Parse and validate a JSON document.
  pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
    Self::load(ScenarioDef::from_json(text)?)
  }

  pub fn id(&self) -> &str {
    &self.def.id
  }

  pub fn title(&self) -> &str {
    &self.def.title
  }

  pub fn initial_phase(&self) -> &str {
    &self.def.initial_phase
  }

  pub fn initial_variables(&self) -> &serde_json::Map<String, serde_json::Value> {
    &self.def.initial_variables
  }

  /// Get a phase by key.
  pub fn phase(&self, key: &str) -> Option<&PhaseDef> {
    self.def.phases.get(key)
  }

  pub fn phases(&self) -> &BTreeMap<String, PhaseDef> {
    &self.def.phases
  }

  pub fn events(&self) -> &[EventDef] {
    &self.def.events
  }

  /// The document's advisory path, verbatim.
  pub fn optimal_path(&self) -> &[String] {
    &self.def.optimal_path
  }

  pub fn graph(&self) -> &PhaseGraph {
    &self.graph
  }

  pub fn lints(&self) -> &[Lint] {
    &self.lints
  }

  pub fn definition(&self) -> &ScenarioDef {
    &self.def
  }
}

fn validate(def: &ScenarioDef) -> Vec<Problem> {
  let mut problems = Vec::new();

  if !def.phases.contains_key(&def.initial_phase) {
    problems.push(Problem::MissingInitialPhase {
      phase: def.initial_phase.clone(),
    });
  }

  for (key, phase) in &def.phases {
    if phase.is_end && !phase.transitions.is_empty() {
      problems.push(Problem::EndPhaseHasTransitions {
        phase: key.clone(),
        count: phase.transitions.len(),
      });
    }

    check_actions(&phase.on_enter, &format!("phase '{key}' onEnter"), &mut problems);

    for transition in &phase.transitions {
      if !def.phases.contains_key(&transition.to) {
        problems.push(Problem::DanglingTransition {
          phase: key.clone(),
          label: transition.label.clone(),
          target: transition.to.clone(),
        });
      }
      if let Some(condition) = &transition.condition {
        let location = format!("transition '{}' in phase '{key}'", transition.label);
        condition.for_each_variable(&mut |path| check_path(path, &location, &mut problems));
      }
    }
  }

  let mut seen_ids = BTreeSet::new();
  for event in &def.events {
    if !seen_ids.insert(event.id.as_str()) {
      problems.push(Problem::DuplicateEventId {
        event_id: event.id.clone(),
      });
    }
    if let EventKind::Timed {
      delay: 0,
      repeatable: true,
      ..
    } = event.kind
    {
      problems.push(Problem::ZeroDelayRepeatable {
        event_id: event.id.clone(),
      });
    }

    let location = format!("event '{}'", event.id);
    if let Some(condition) = event.condition() {
      condition.for_each_variable(&mut |path| check_path(path, &location, &mut problems));
    }
    check_actions(&event.actions, &location, &mut problems);
  }

  problems
}

/// Check variable paths in an action list, descending into timer callbacks.
fn check_actions(actions: &[Action], location: &str, problems: &mut Vec<Problem>) {
  for action in actions {
    match action {
      Action::SetVariable(set) => check_path(&set.variable, location, problems),
      Action::StartTimer(timer) => {
        let nested = format!("{location} timer '{}'", timer.name);
        check_actions(&timer.callback, &nested, problems);
      }
      Action::Emit(_) | Action::StopTimer(_) | Action::Unrecognized(_) => {}
    }
  }
}

fn check_path(path: &str, location: &str, problems: &mut Vec<Problem>) {
  if let Err(source) = VarPath::parse(path) {
    problems.push(Problem::MalformedPath {
      location: location.to_string(),
      source,
    });
  }
}

fn lint(def: &ScenarioDef, graph: &PhaseGraph) -> Vec<Lint> {
  let mut lints = Vec::new();

  for (key, phase) in &def.phases {
    if !phase.is_end && phase.transitions.is_empty() {
      lints.push(Lint::DeadEndPhase { phase: key.clone() });
    }

    let mut labels = BTreeSet::new();
    for transition in &phase.transitions {
      if !labels.insert(transition.label.as_str()) {
        lints.push(Lint::DuplicateLabel {
          phase: key.clone(),
          label: transition.label.clone(),
        });
      }
    }
  }

  let reachable = graph.reachable_from(&def.initial_phase);
  for key in def.phases.keys() {
    if !reachable.contains(key) {
      lints.push(Lint::UnreachablePhase { phase: key.clone() });
    }
  }

  for phase in &def.optimal_path {
    if !def.phases.contains_key(phase) {
      lints.push(Lint::UnknownOptimalPathPhase {
        phase: phase.clone(),
      });
    }
  }
  for step in def.optimal_path.windows(2) {
    let (from, to) = (&step[0], &step[1]);
    if def.phases.contains_key(from) && def.phases.contains_key(to) && !graph.has_edge(from, to) {
      lints.push(Lint::OptimalPathGap {
        from: from.clone(),
        to: to.clone(),
      });
    }
  }

  lints
}
