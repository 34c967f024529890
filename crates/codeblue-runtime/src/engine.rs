//! The scenario state machine.
//!
//! [`ScenarioEngine`] owns one running instance of a [`Scenario`]. It tracks
//! the current phase, runs `onEnter` actions, decides which transitions are
//! eligible, and fires timers and scenario events when the caller advances
//! the logical clock with [`ScenarioEngine::tick`].

use std::collections::BTreeSet;
use std::sync::Arc;

use codeblue_config::{Action, EventKind, PhaseDef, ScenarioDef, TransitionDef};
use codeblue_scenario::Scenario;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::action::{ActionExecutor, ActionSource};
use crate::condition::evaluate;
use crate::error::EngineError;
use crate::observer::{EngineEvent, NoopObserver, Observer};
use crate::scheduler::{Due, PendingTimer, Scheduler};
use crate::variables::VariableStore;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Upper bound on timers and events firing at one due time within a
  /// single `tick`. Work spread over many due times is never limited.
  pub max_firings_per_tick: usize,
  /// Render `{{ ... }}` templates in `emit` payloads. Rendered leaves are
  /// always strings, and a malformed template fails the action list with
  /// [`EngineError::Template`]. Payloads without template markers are
  /// published exactly as authored.
  pub render_payloads: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_firings_per_tick: 10_000,
      render_payloads: true,
    }
  }
}

/// One entry in the phase history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseVisit {
  pub phase: String,
  pub entered_at: u64,
  /// Label of the transition that led here; `None` for the initial phase.
  pub via: Option<String>,
}

/// Result of a successful transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub from: String,
  pub to: String,
  pub label: String,
  pub at: u64,
  pub ended: bool,
}

/// What a `tick` fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
  pub clock: u64,
  pub timers_fired: Vec<String>,
  pub events_fired: Vec<String>,
  pub events_skipped: Vec<String>,
}

/// Serializable view of an instance, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
  pub instance_id: String,
  pub scenario_id: String,
  pub current_phase: String,
  pub phase_entered_at: u64,
  pub started_at: u64,
  pub clock: u64,
  pub ended: bool,
  pub variables: serde_json::Value,
  /// Pending timers as `(name, fire_at)`, in firing order.
  pub pending_timers: Vec<(String, u64)>,
  pub fired_events: Vec<String>,
  pub history: Vec<PhaseVisit>,
}

/// A running scenario instance.
///
/// Generic over `O: Observer` to allow different notification strategies.
/// Use [`ScenarioEngine::start`] for an engine with no-op notifications, or
/// [`ScenarioEngine::start_with`] to provide an observer and configuration.
pub struct ScenarioEngine<O: Observer = NoopObserver> {
  scenario: Arc<Scenario>,
  config: EngineConfig,
  observer: O,
  instance_id: String,
  started_at: u64,
  clock: u64,
  current_phase: String,
  phase_entered_at: u64,
  variables: VariableStore,
  scheduler: Scheduler,
  fired_events: BTreeSet<String>,
  history: Vec<PhaseVisit>,
  ended: bool,
}

impl ScenarioEngine<NoopObserver> {
  /// Validate `document` and start it at logical time `now`.
  pub fn start(document: ScenarioDef, now: u64) -> Result<Self, EngineError> {
    let scenario = Arc::new(Scenario::load(document)?);
    Self::start_with(scenario, NoopObserver, EngineConfig::default(), now)
  }
}

impl<O: Observer> ScenarioEngine<O> {
  /// Start a validated scenario.
  ///
  /// Variables are initialised from the document, the initial phase is
  /// entered (running its `onEnter` actions) and timed events are armed
  /// relative to `now`.
  #[instrument(
    name = "scenario_start",
    skip(scenario, observer, config),
    fields(scenario_id = %scenario.id())
  )]
  pub fn start_with(
    scenario: Arc<Scenario>,
    observer: O,
    config: EngineConfig,
    now: u64,
  ) -> Result<Self, EngineError> {
    let instance_id = uuid::Uuid::new_v4().to_string();
    let initial_phase = scenario.initial_phase().to_string();

    let mut engine = Self {
      variables: VariableStore::new(scenario.initial_variables().clone()),
      scenario,
      config,
      observer,
      instance_id,
      started_at: now,
      clock: now,
      current_phase: initial_phase.clone(),
      phase_entered_at: now,
      scheduler: Scheduler::new(),
      fired_events: BTreeSet::new(),
      history: Vec::new(),
      ended: false,
    };

    info!(
      instance_id = %engine.instance_id,
      initial_phase = %initial_phase,
      at = now,
      "scenario_started"
    );
    engine.observer.notify(EngineEvent::ScenarioStarted {
      scenario_id: engine.scenario.id().to_string(),
      at: now,
    });

    for (index, event) in engine.scenario.events().iter().enumerate() {
      if let EventKind::Timed { delay, .. } = event.kind {
        engine.scheduler.arm_event(index, now.saturating_add(delay));
      }
    }

    engine.enter_phase(&initial_phase, None)?;
    Ok(engine)
  }

  /// Take the transition labeled `label` out of the current phase.
  ///
  /// When several transitions share a label, the first declared wins.
  /// Leaving a phase cancels every pending timer.
  #[instrument(
    name = "scenario_transition",
    skip(self),
    fields(instance_id = %self.instance_id, phase = %self.current_phase)
  )]
  pub fn request_transition(&mut self, label: &str) -> Result<TransitionRecord, EngineError> {
    if self.ended {
      return Err(EngineError::ScenarioEnded {
        phase: self.current_phase.clone(),
        label: label.to_string(),
      });
    }

    let scenario = Arc::clone(&self.scenario);
    let phase = lookup_phase(&scenario, &self.current_phase)?;
    let transition = phase
      .transitions
      .iter()
      .find(|transition| transition.label == label)
      .ok_or_else(|| EngineError::InvalidTransition {
        phase: self.current_phase.clone(),
        label: label.to_string(),
      })?;

    if !self.is_eligible(transition)? {
      return Err(EngineError::TransitionNotEligible {
        phase: self.current_phase.clone(),
        label: label.to_string(),
      });
    }

    let from = self.current_phase.clone();
    let cancelled = self.scheduler.cancel_timers();
    if !cancelled.is_empty() {
      debug!(phase = %from, timers = ?cancelled, "timers_cancelled");
      self.observer.notify(EngineEvent::TimersCancelled {
        phase: from.clone(),
        timers: cancelled,
        at: self.clock,
      });
    }

    info!(from = %from, to = %transition.to, label = %label, at = self.clock, "transition_taken");
    self.observer.notify(EngineEvent::TransitionTaken {
      from: from.clone(),
      to: transition.to.clone(),
      label: label.to_string(),
      at: self.clock,
    });

    self.enter_phase(&transition.to, Some(label))?;

    Ok(TransitionRecord {
      from,
      to: transition.to.clone(),
      label: label.to_string(),
      at: self.clock,
      ended: self.ended,
    })
  }

  /// Advance the logical clock to `now`, firing everything that comes due.
  ///
  /// Work fires in due-time order and the clock steps to each item's due
  /// time while it runs. A `now` earlier than the current clock is clamped.
  #[instrument(name = "scenario_tick", skip(self), fields(instance_id = %self.instance_id))]
  pub fn tick(&mut self, now: u64) -> Result<TickReport, EngineError> {
    let now = if now < self.clock {
      warn!(clock = self.clock, requested = now, "tick_clock_regression");
      self.clock
    } else {
      now
    };

    let mut report = TickReport::default();
    // Firings at the current due time. Only zero-duration timers that keep
    // restarting themselves can pile up work without the clock advancing.
    let mut burst_at = None;
    let mut burst = 0usize;
    while let Some(due) = self.scheduler.pop_due(now) {
      let at = due.fire_at();
      if burst_at == Some(at) {
        burst += 1;
      } else {
        burst_at = Some(at);
        burst = 1;
      }
      if burst > self.config.max_firings_per_tick {
        return Err(EngineError::RunawayScheduler {
          at,
          limit: self.config.max_firings_per_tick,
        });
      }

      self.clock = at;
      match due {
        Due::Timer(timer) => {
          let name = timer.name.clone();
          self.fire_timer(timer)?;
          report.timers_fired.push(name);
        }
        Due::Event { index, fire_at } => {
          let (event_id, ran) = self.fire_timed_event(index, fire_at)?;
          if ran {
            report.events_fired.push(event_id);
          } else {
            report.events_skipped.push(event_id);
          }
        }
      }
      report
        .events_fired
        .extend(self.evaluate_conditional_events()?);
    }

    self.clock = now;
    report
      .events_fired
      .extend(self.evaluate_conditional_events()?);
    report.clock = now;
    Ok(report)
  }

  /// Transitions whose guards currently hold, in declaration order.
  ///
  /// Empty once the scenario has ended.
  pub fn eligible_transitions(&self) -> Result<Vec<&TransitionDef>, EngineError> {
    if self.ended {
      return Ok(Vec::new());
    }

    let phase = lookup_phase(&self.scenario, &self.current_phase)?;
    let mut eligible = Vec::new();
    for transition in &phase.transitions {
      if self.is_eligible(transition)? {
        eligible.push(transition);
      }
    }
    Ok(eligible)
  }

  pub fn current_phase(&self) -> &str {
    &self.current_phase
  }

  /// Definition of the current phase.
  pub fn current_phase_def(&self) -> Option<&PhaseDef> {
    self.scenario.phase(&self.current_phase)
  }

  pub fn variables(&self) -> &VariableStore {
    &self.variables
  }

  /// Look up a single variable by dotted path. Malformed paths yield `None`.
  pub fn variable(&self, path: &str) -> Option<&serde_json::Value> {
    self.variables.lookup(path).ok().flatten()
  }

  pub fn is_ended(&self) -> bool {
    self.ended
  }

  pub fn instance_id(&self) -> &str {
    &self.instance_id
  }

  pub fn scenario(&self) -> &Arc<Scenario> {
    &self.scenario
  }

  /// The document's advisory optimal path. Not interpreted by the engine.
  pub fn optimal_path(&self) -> &[String] {
    self.scenario.optimal_path()
  }

  pub fn history(&self) -> &[PhaseVisit] {
    &self.history
  }

  pub fn clock(&self) -> u64 {
    self.clock
  }

  pub fn started_at(&self) -> u64 {
    self.started_at
  }

  pub fn phase_entered_at(&self) -> u64 {
    self.phase_entered_at
  }

  /// Milliseconds since the current phase was entered.
  pub fn phase_elapsed(&self) -> u64 {
    self.clock.saturating_sub(self.phase_entered_at)
  }

  /// Milliseconds since the scenario started.
  pub fn scenario_elapsed(&self) -> u64 {
    self.clock.saturating_sub(self.started_at)
  }

  /// Ids of non-repeatable events that have fired or been skipped.
  pub fn fired_events(&self) -> &BTreeSet<String> {
    &self.fired_events
  }

  /// Pending phase-scoped timers, in firing order.
  pub fn pending_timers(&self) -> Vec<&PendingTimer> {
    self.scheduler.pending_timers()
  }

  /// Due time of the next timer or timed event, if any.
  pub fn next_due_at(&self) -> Option<u64> {
    self.scheduler.next_due_at()
  }

  pub fn observer(&self) -> &O {
    &self.observer
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn snapshot(&self) -> InstanceSnapshot {
    InstanceSnapshot {
      instance_id: self.instance_id.clone(),
      scenario_id: self.scenario.id().to_string(),
      current_phase: self.current_phase.clone(),
      phase_entered_at: self.phase_entered_at,
      started_at: self.started_at,
      clock: self.clock,
      ended: self.ended,
      variables: self.variables.to_value(),
      pending_timers: self
        .scheduler
        .pending_timers()
        .into_iter()
        .map(|timer| (timer.name.clone(), timer.fire_at))
        .collect(),
      fired_events: self.fired_events.iter().cloned().collect(),
      history: self.history.clone(),
    }
  }

  fn is_eligible(&self, transition: &TransitionDef) -> Result<bool, EngineError> {
    match &transition.condition {
      None => Ok(true),
      Some(condition) => evaluate(condition, &self.variables, self.phase_elapsed()).map_err(|source| {
        EngineError::Evaluation {
          origin: format!(
            "transition '{}' in phase '{}'",
            transition.label, self.current_phase
          ),
          source,
        }
      }),
    }
  }

  fn enter_phase(&mut self, phase: &str, via: Option<&str>) -> Result<(), EngineError> {
    let scenario = Arc::clone(&self.scenario);
    let def = lookup_phase(&scenario, phase)?;

    self.current_phase = phase.to_string();
    self.phase_entered_at = self.clock;
    self.ended = def.is_end;
    self.history.push(PhaseVisit {
      phase: phase.to_string(),
      entered_at: self.clock,
      via: via.map(str::to_string),
    });

    info!(phase = %phase, at = self.clock, is_end = def.is_end, "phase_entered");
    self.observer.notify(EngineEvent::PhaseEntered {
      phase: phase.to_string(),
      at: self.clock,
    });

    let source = ActionSource::PhaseEntry {
      phase: phase.to_string(),
    };
    self.run_actions(&def.on_enter, &source)?;

    if def.is_end {
      info!(phase = %phase, at = self.clock, "scenario_ended");
      self.observer.notify(EngineEvent::ScenarioEnded {
        phase: phase.to_string(),
        at: self.clock,
      });
    }

    self.evaluate_conditional_events()?;
    Ok(())
  }

  fn run_actions(&mut self, actions: &[Action], source: &ActionSource) -> Result<(), EngineError> {
    ActionExecutor {
      variables: &mut self.variables,
      scheduler: &mut self.scheduler,
      observer: &self.observer,
      render_payloads: self.config.render_payloads,
      now: self.clock,
      source,
    }
    .execute(actions)
  }

  fn fire_timer(&mut self, timer: PendingTimer) -> Result<(), EngineError> {
    info!(timer = %timer.name, at = self.clock, phase = %self.current_phase, "timer_fired");
    self.observer.notify(EngineEvent::TimerFired {
      timer: timer.name.clone(),
      at: self.clock,
    });
    let source = ActionSource::Timer {
      name: timer.name.clone(),
    };
    self.run_actions(&timer.callback, &source)
  }

  /// Fire the timed event at `index`. Returns its id and whether its
  /// actions ran (`false` when its condition was false).
  fn fire_timed_event(&mut self, index: usize, fire_at: u64) -> Result<(String, bool), EngineError> {
    let scenario = Arc::clone(&self.scenario);
    let Some(event) = scenario.events().get(index) else {
      return Err(EngineError::UnknownEvent {
        event: format!("#{index}"),
      });
    };
    let EventKind::Timed {
      delay,
      repeatable,
      condition,
    } = &event.kind
    else {
      return Err(EngineError::UnknownEvent {
        event: event.id.clone(),
      });
    };

    if *repeatable {
      self.scheduler.arm_event(index, fire_at.saturating_add(*delay));
    } else {
      // Marked even when skipped: a non-repeatable event gets one chance.
      self.fired_events.insert(event.id.clone());
    }

    let holds = match condition {
      None => true,
      Some(condition) => evaluate(condition, &self.variables, self.scenario_elapsed()).map_err(
        |source| EngineError::Evaluation {
          origin: format!("event '{}'", event.id),
          source,
        },
      )?,
    };

    if !holds {
      debug!(event_id = %event.id, at = self.clock, "event_skipped");
      self.observer.notify(EngineEvent::EventSkipped {
        event_id: event.id.clone(),
        at: self.clock,
      });
      return Ok((event.id.clone(), false));
    }

    self.run_event(&event.id, &event.actions)?;
    Ok((event.id.clone(), true))
  }

  /// Fire every conditional event whose condition now holds, repeating until
  /// no more fire. Returns the ids fired, in order.
  fn evaluate_conditional_events(&mut self) -> Result<Vec<String>, EngineError> {
    let scenario = Arc::clone(&self.scenario);
    let mut fired = Vec::new();
    loop {
      let mut progressed = false;
      for event in scenario.events() {
        let EventKind::Conditional { condition } = &event.kind else {
          continue;
        };
        if self.fired_events.contains(&event.id) {
          continue;
        }

        let holds = evaluate(condition, &self.variables, self.scenario_elapsed()).map_err(
          |source| EngineError::Evaluation {
            origin: format!("event '{}'", event.id),
            source,
          },
        )?;
        if !holds {
          continue;
        }

        self.fired_events.insert(event.id.clone());
        self.run_event(&event.id, &event.actions)?;
        fired.push(event.id.clone());
        progressed = true;
      }
      if !progressed {
        return Ok(fired);
      }
    }
  }

  fn run_event(&mut self, event_id: &str, actions: &[Action]) -> Result<(), EngineError> {
    info!(event_id = %event_id, at = self.clock, "event_fired");
    self.observer.notify(EngineEvent::EventFired {
      event_id: event_id.to_string(),
      at: self.clock,
    });
    let source = ActionSource::Event {
      event_id: event_id.to_string(),
    };
    self.run_actions(actions, &source)
  }
}

fn lookup_phase<'s>(scenario: &'s Scenario, phase: &str) -> Result<&'s PhaseDef, EngineError> {
  scenario.phase(phase).ok_or_else(|| EngineError::UnknownPhase {
    phase: phase.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn engine() -> ScenarioEngine {
    let def: ScenarioDef = serde_json::from_value(json!({
      "id": "events",
      "title": "Events",
      "initialPhase": "a",
      "phases": { "a": { "isEnd": true } },
      "events": [
        { "id": "page", "type": "timed", "delay": 500, "actions": [] },
        {
          "id": "alarm",
          "type": "conditional",
          "condition": { "type": "variable", "variable": "hr", "operator": ">", "value": 200 },
          "actions": []
        }
      ]
    }))
    .unwrap();
    ScenarioEngine::start(def, 0).unwrap()
  }

  #[test]
  fn test_fire_timed_event_rejects_foreign_indices() {
    let mut engine = engine();

    let err = engine.fire_timed_event(7, 500).unwrap_err();
    assert!(matches!(err, EngineError::UnknownEvent { ref event } if event == "#7"));

    let err = engine.fire_timed_event(1, 500).unwrap_err();
    assert!(matches!(err, EngineError::UnknownEvent { ref event } if event == "alarm"));
    assert!(engine.fired_events().is_empty());
  }

  #[test]
  fn test_fire_timed_event_marks_non_repeatable() {
    let mut engine = engine();

    assert_eq!(
      engine.fire_timed_event(0, 500).unwrap(),
      ("page".to_string(), true)
    );
    assert!(engine.fired_events().contains("page"));
  }
}
