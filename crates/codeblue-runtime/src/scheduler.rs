//! Pending timed work and its firing order.
//!
//! Two kinds of work are tracked:
//! - phase-scoped timers, registered by `startTimer` and dropped on phase exit;
//! - armed timed scenario events, which survive phase transitions.
//!
//! Due work is handed out earliest first. At equal due times timers come
//! before events, timers in registration order and events in declaration
//! order.

use std::collections::BTreeMap;

use codeblue_config::Action;

/// A timer waiting to fire.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTimer {
  pub name: String,
  pub fire_at: u64,
  pub callback: Vec<Action>,
  seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedEvent {
  index: usize,
  fire_at: u64,
}

/// Work popped from the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Due {
  Timer(PendingTimer),
  /// Index into the scenario's event list.
  Event { index: usize, fire_at: u64 },
}

impl Due {
  pub(crate) fn fire_at(&self) -> u64 {
    match self {
      Due::Timer(timer) => timer.fire_at,
      Due::Event { fire_at, .. } => *fire_at,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
  timers: BTreeMap<String, PendingTimer>,
  armed: Vec<ArmedEvent>,
  next_seq: u64,
}

impl Scheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a timer due `duration` ms after `now`.
  ///
  /// A timer with the same name is replaced and returned.
  pub fn start_timer(
    &mut self,
    name: &str,
    duration: u64,
    callback: Vec<Action>,
    now: u64,
  ) -> Option<PendingTimer> {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.timers.insert(
      name.to_string(),
      PendingTimer {
        name: name.to_string(),
        fire_at: now.saturating_add(duration),
        callback,
        seq,
      },
    )
  }

  /// Remove a timer. Absent timers are not an error.
  pub fn stop_timer(&mut self, name: &str) -> Option<PendingTimer> {
    self.timers.remove(name)
  }

  /// Drop every pending timer, returning their names in firing order.
  pub fn cancel_timers(&mut self) -> Vec<String> {
    let mut cancelled: Vec<PendingTimer> = std::mem::take(&mut self.timers).into_values().collect();
    cancelled.sort_by_key(|timer| (timer.fire_at, timer.seq));
    cancelled.into_iter().map(|timer| timer.name).collect()
  }

  /// Arm the scenario event at `index` to fire at `fire_at`.
  pub fn arm_event(&mut self, index: usize, fire_at: u64) {
    self.armed.push(ArmedEvent { index, fire_at });
  }

  pub fn timer(&self, name: &str) -> Option<&PendingTimer> {
    self.timers.get(name)
  }

  /// Pending timers in firing order.
  pub fn pending_timers(&self) -> Vec<&PendingTimer> {
    let mut timers: Vec<&PendingTimer> = self.timers.values().collect();
    timers.sort_by_key(|timer| (timer.fire_at, timer.seq));
    timers
  }

  /// Armed events as `(event index, fire_at)`, in firing order.
  pub fn armed_events(&self) -> Vec<(usize, u64)> {
    let mut armed: Vec<(usize, u64)> = self
      .armed
      .iter()
      .map(|event| (event.index, event.fire_at))
      .collect();
    armed.sort_by_key(|&(index, fire_at)| (fire_at, index));
    armed
  }

  /// Due time of the earliest pending work.
  pub fn next_due_at(&self) -> Option<u64> {
    let timer = self.timers.values().map(|timer| timer.fire_at).min();
    let event = self.armed.iter().map(|event| event.fire_at).min();
    match (timer, event) {
      (Some(t), Some(e)) => Some(t.min(e)),
      (t, e) => t.or(e),
    }
  }

  /// Remove and return the earliest work due at or before `now`.
  pub(crate) fn pop_due(&mut self, now: u64) -> Option<Due> {
    let timer = self
      .timers
      .values()
      .filter(|timer| timer.fire_at <= now)
      .min_by_key(|timer| (timer.fire_at, timer.seq))
      .map(|timer| (timer.fire_at, timer.name.clone()));
    let event = self
      .armed
      .iter()
      .enumerate()
      .filter(|(_, event)| event.fire_at <= now)
      .min_by_key(|(_, event)| (event.fire_at, event.index))
      .map(|(slot, event)| (event.fire_at, slot));

    match (timer, event) {
      (Some((timer_at, name)), Some((event_at, _))) if timer_at <= event_at => {
        self.timers.remove(&name).map(Due::Timer)
      }
      (None, Some((_, slot))) | (Some(_), Some((_, slot))) => {
        let event = self.armed.swap_remove(slot);
        Some(Due::Event {
          index: event.index,
          fire_at: event.fire_at,
        })
      }
      (Some((_, name)), None) => self.timers.remove(&name).map(Due::Timer),
      (None, None) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn drain(scheduler: &mut Scheduler, now: u64) -> Vec<Due> {
    std::iter::from_fn(|| scheduler.pop_due(now)).collect()
  }

  fn label(due: &Due) -> String {
    match due {
      Due::Timer(timer) => format!("timer:{}@{}", timer.name, timer.fire_at),
      Due::Event { index, fire_at } => format!("event:{index}@{fire_at}"),
    }
  }

  #[test]
  fn test_due_work_fires_in_time_order() {
    let mut scheduler = Scheduler::new();
    scheduler.start_timer("late", 300, vec![], 0);
    scheduler.start_timer("early", 100, vec![], 0);
    scheduler.arm_event(1, 200);
    scheduler.arm_event(0, 200);
    scheduler.arm_event(2, 900);

    let fired: Vec<String> = drain(&mut scheduler, 500).iter().map(label).collect();
    assert_eq!(
      fired,
      vec!["timer:early@100", "event:0@200", "event:1@200", "timer:late@300"]
    );
    assert_eq!(scheduler.next_due_at(), Some(900));
  }

  #[test]
  fn test_timers_win_ties_and_keep_registration_order() {
    let mut scheduler = Scheduler::new();
    scheduler.arm_event(0, 100);
    scheduler.start_timer("b", 100, vec![], 0);
    scheduler.start_timer("a", 100, vec![], 0);

    let fired: Vec<String> = drain(&mut scheduler, 100).iter().map(label).collect();
    assert_eq!(fired, vec!["timer:b@100", "timer:a@100", "event:0@100"]);
  }

  #[test]
  fn test_restart_replaces_timer() {
    let mut scheduler = Scheduler::new();
    scheduler.start_timer("alarm", 100, vec![], 0);
    let replaced = scheduler.start_timer("alarm", 500, vec![Action::stop_timer("x")], 50);

    assert_eq!(replaced.map(|t| t.fire_at), Some(100));
    let timer = scheduler.timer("alarm").unwrap();
    assert_eq!(timer.fire_at, 550);
    assert_eq!(timer.callback.len(), 1);
    assert!(drain(&mut scheduler, 549).is_empty());
  }

  #[test]
  fn test_stop_and_cancel() {
    let mut scheduler = Scheduler::new();
    assert!(scheduler.stop_timer("missing").is_none());

    scheduler.start_timer("second", 200, vec![], 0);
    scheduler.start_timer("first", 100, vec![], 0);
    scheduler.arm_event(0, 50);

    assert_eq!(scheduler.cancel_timers(), vec!["first", "second"]);
    assert!(scheduler.pending_timers().is_empty());
    assert_eq!(scheduler.armed_events(), vec![(0, 50)]);
  }
}
