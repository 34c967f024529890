//! Action execution.

use std::fmt;

use codeblue_config::Action;
use codeblue_scenario::VarPath;
use tracing::debug;

use crate::error::EngineError;
use crate::observer::Observer;
use crate::scheduler::Scheduler;
use crate::template::render_payload;
use crate::variables::VariableStore;

/// Where an action list came from. Used to attribute errors and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSource {
  PhaseEntry { phase: String },
  Timer { name: String },
  Event { event_id: String },
}

impl fmt::Display for ActionSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ActionSource::PhaseEntry { phase } => write!(f, "phase '{phase}' onEnter"),
      ActionSource::Timer { name } => write!(f, "timer '{name}'"),
      ActionSource::Event { event_id } => write!(f, "event '{event_id}'"),
    }
  }
}

/// Applies action lists to the parts of an instance they may touch.
///
/// Actions run in order. If one fails, the error is returned and the
/// mutations made by earlier actions in the list stay applied.
pub(crate) struct ActionExecutor<'a, O: Observer> {
  pub variables: &'a mut VariableStore,
  pub scheduler: &'a mut Scheduler,
  pub observer: &'a O,
  pub render_payloads: bool,
  pub now: u64,
  pub source: &'a ActionSource,
}

impl<O: Observer> ActionExecutor<'_, O> {
  pub fn execute(&mut self, actions: &[Action]) -> Result<(), EngineError> {
    for action in actions {
      self.apply(action)?;
    }
    Ok(())
  }

  fn apply(&mut self, action: &Action) -> Result<(), EngineError> {
    match action {
      Action::SetVariable(set) => {
        let path = VarPath::parse(&set.variable).map_err(|e| self.variable_error(e.into()))?;
        self
          .variables
          .set(&path, set.value.clone())
          .map_err(|e| self.variable_error(e))?;
        debug!(source = %self.source, variable = %path, value = %set.value, "variable_set");
      }
      Action::Emit(emit) => {
        let payload = if self.render_payloads {
          render_payload(&emit.payload, self.variables).map_err(|e| EngineError::Template {
            origin: self.source.to_string(),
            event: emit.event.clone(),
            message: e.to_string(),
          })?
        } else {
          emit.payload.clone()
        };
        debug!(source = %self.source, event = %emit.event, "event_emitted");
        self.observer.emit(&emit.event, &payload);
      }
      Action::StartTimer(timer) => {
        let replaced =
          self
            .scheduler
            .start_timer(&timer.name, timer.duration, timer.callback.clone(), self.now);
        debug!(
          source = %self.source,
          timer = %timer.name,
          fire_at = self.now.saturating_add(timer.duration),
          replaced = replaced.is_some(),
          "timer_started"
        );
      }
      Action::StopTimer(timer) => {
        let stopped = self.scheduler.stop_timer(&timer.name);
        debug!(
          source = %self.source,
          timer = %timer.name,
          was_pending = stopped.is_some(),
          "timer_stopped"
        );
      }
      Action::Unrecognized(unknown) => {
        return Err(EngineError::UnknownAction {
          origin: self.source.to_string(),
          kind: unknown.kind.clone(),
        });
      }
    }
    Ok(())
  }

  fn variable_error(&self, source: crate::variables::VariableError) -> EngineError {
    EngineError::Variable {
      origin: self.source.to_string(),
      source,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::observer::EventBus;
  use serde_json::json;
  use std::sync::{Arc, Mutex};

  struct Harness {
    variables: VariableStore,
    scheduler: Scheduler,
    bus: EventBus,
    emitted: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
  }

  impl Harness {
    fn new() -> Self {
      let emitted = Arc::new(Mutex::new(Vec::new()));
      let mut bus = EventBus::new();
      let sink = Arc::clone(&emitted);
      bus.on_any(move |event, payload| {
        sink
          .lock()
          .unwrap()
          .push((event.to_string(), payload.clone()))
      });
      Self {
        variables: VariableStore::default(),
        scheduler: Scheduler::new(),
        bus,
        emitted,
      }
    }

    fn run(&mut self, actions: &[Action], now: u64) -> Result<(), EngineError> {
      let source = ActionSource::PhaseEntry {
        phase: "test".to_string(),
      };
      ActionExecutor {
        variables: &mut self.variables,
        scheduler: &mut self.scheduler,
        observer: &self.bus,
        render_payloads: true,
        now,
        source: &source,
      }
      .execute(actions)
    }
  }

  #[test]
  fn test_set_emit_and_timers() {
    let mut h = Harness::new();
    h.run(
      &[
        Action::set("heartRate", 180),
        Action::set("staff.vets", 2),
        Action::emit("alarm", json!({ "hr": "{{ heartRate }}" })),
        Action::start_timer("deteriorate", 60_000, vec![Action::set("heartRate", 200)]),
        Action::start_timer("recheck", 5_000, vec![]),
        Action::stop_timer("recheck"),
        Action::stop_timer("never-started"),
      ],
      1_000,
    )
    .unwrap();

    assert_eq!(h.variables.to_value(), json!({ "heartRate": 180, "staff": { "vets": 2 } }));
    assert_eq!(
      *h.emitted.lock().unwrap(),
      vec![("alarm".to_string(), json!({ "hr": "180" }))]
    );
    let pending: Vec<&str> = h
      .scheduler
      .pending_timers()
      .iter()
      .map(|t| t.name.as_str())
      .collect();
    assert_eq!(pending, vec!["deteriorate"]);
    assert_eq!(h.scheduler.timer("deteriorate").unwrap().fire_at, 61_000);
  }

  #[test]
  fn test_later_start_supersedes_earlier() {
    let mut h = Harness::new();
    h.run(
      &[
        Action::start_timer("t", 100, vec![]),
        Action::start_timer("t", 900, vec![Action::set("x", 1)]),
      ],
      0,
    )
    .unwrap();

    let timer = h.scheduler.timer("t").unwrap();
    assert_eq!(timer.fire_at, 900);
    assert_eq!(timer.callback, vec![Action::set("x", 1)]);
  }

  #[test]
  fn test_unknown_action_fails_after_earlier_mutations() {
    let mut h = Harness::new();
    let unknown: Action = serde_json::from_value(json!({ "type": "playSound" })).unwrap();

    let err = h
      .run(&[Action::set("a", 1), unknown, Action::set("b", 2)], 0)
      .unwrap_err();

    match err {
      EngineError::UnknownAction { origin, kind } => {
        assert_eq!(origin, "phase 'test' onEnter");
        assert_eq!(kind, "playSound");
      }
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.variables.to_value(), json!({ "a": 1 }));
  }

  #[test]
  fn test_set_through_leaf_reports_source() {
    let mut h = Harness::new();
    let err = h
      .run(&[Action::set("hr", 1), Action::set("hr.value", 2)], 0)
      .unwrap_err();
    assert!(matches!(err, EngineError::Variable { ref origin, .. } if origin == "phase 'test' onEnter"));
  }
}
