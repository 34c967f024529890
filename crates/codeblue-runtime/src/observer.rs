//! Observers: where `emit` actions and engine lifecycle events go.
//!
//! The engine publishes synchronously, inside the `start`,
//! `request_transition` or `tick` call that caused the event. Nothing is
//! buffered by the engine itself.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Lifecycle events emitted while a scenario runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
  ScenarioStarted { scenario_id: String, at: u64 },
  PhaseEntered { phase: String, at: u64 },
  TransitionTaken {
    from: String,
    to: String,
    label: String,
    at: u64,
  },
  /// Phase-scoped timers dropped because their phase was exited.
  TimersCancelled {
    phase: String,
    timers: Vec<String>,
    at: u64,
  },
  TimerFired { timer: String, at: u64 },
  EventFired { event_id: String, at: u64 },
  /// A timed event came due but its condition was false.
  EventSkipped { event_id: String, at: u64 },
  /// An `emit` action published a payload.
  Emitted {
    event: String,
    payload: serde_json::Value,
  },
  ScenarioEnded { phase: String, at: u64 },
}

/// Receives `emit` actions and lifecycle events from the engine.
pub trait Observer: Send + Sync {
  /// Called for every `emit` action, after payload rendering.
  fn emit(&self, event: &str, payload: &serde_json::Value);

  /// Called for lifecycle events. Ignored by default.
  fn notify(&self, _event: EngineEvent) {}
}

impl<T: Observer + ?Sized> Observer for Arc<T> {
  fn emit(&self, event: &str, payload: &serde_json::Value) {
    (**self).emit(event, payload);
  }

  fn notify(&self, event: EngineEvent) {
    (**self).notify(event);
  }
}

/// An observer that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
  fn emit(&self, _event: &str, _payload: &serde_json::Value) {}
}

type Handler = Box<dyn Fn(&serde_json::Value) + Send + Sync>;
type AnyHandler = Box<dyn Fn(&str, &serde_json::Value) + Send + Sync>;

/// Subscribe/publish bus keyed by event name.
///
/// ```ignore
/// let mut bus = EventBus::new();
/// bus.on("alarm", |payload| println!("alarm: {payload}"));
/// ```
#[derive(Default)]
pub struct EventBus {
  handlers: BTreeMap<String, Vec<Handler>>,
  any: Vec<AnyHandler>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `handler` for `event`. Handlers run in registration order.
  pub fn on(
    &mut self,
    event: impl Into<String>,
    handler: impl Fn(&serde_json::Value) + Send + Sync + 'static,
  ) -> &mut Self {
    self
      .handlers
      .entry(event.into())
      .or_default()
      .push(Box::new(handler));
    self
  }

  /// Register `handler` for every event. Runs after the named handlers.
  pub fn on_any(
    &mut self,
    handler: impl Fn(&str, &serde_json::Value) + Send + Sync + 'static,
  ) -> &mut Self {
    self.any.push(Box::new(handler));
    self
  }

  pub fn handler_count(&self, event: &str) -> usize {
    self.handlers.get(event).map_or(0, Vec::len)
  }
}

impl fmt::Debug for EventBus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let counts: BTreeMap<&str, usize> = self
      .handlers
      .iter()
      .map(|(event, handlers)| (event.as_str(), handlers.len()))
      .collect();
    f.debug_struct("EventBus")
      .field("handlers", &counts)
      .field("any", &self.any.len())
      .finish()
  }
}

impl Observer for EventBus {
  fn emit(&self, event: &str, payload: &serde_json::Value) {
    if let Some(handlers) = self.handlers.get(event) {
      for handler in handlers {
        handler(payload);
      }
    }
    for handler in &self.any {
      handler(event, payload);
    }
  }
}

/// An observer that forwards everything to an unbounded channel.
///
/// Use this when events are consumed asynchronously, e.g. streamed to a UI.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
  // Unbounded so a slow consumer never stalls the engine. Volume is one
  // message per action or phase change.
  sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelObserver {
  pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
    Self { sender }
  }

  /// Create an observer and the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl Observer for ChannelObserver {
  fn emit(&self, event: &str, payload: &serde_json::Value) {
    self.notify(EngineEvent::Emitted {
      event: event.to_string(),
      payload: payload.clone(),
    });
  }

  fn notify(&self, event: EngineEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
