use std::time::Duration;
use tokio::time::Instant;

use super::category::{Category, PerCategory};

/// Default minimum spacing between fetches of one category
pub const THROTTLE_WINDOW: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy, Default)]
struct FetchState {
  in_flight: bool,
  last_attempt: Option<Instant>,
}

/// Per-category gate deciding whether a fetch may start.
///
/// `should_fetch` only answers; the caller must `record_attempt` under the
/// same lock before issuing the request so a concurrent caller sees the
/// category as in-flight.
#[derive(Debug, Clone)]
pub struct RequestThrottleGate {
  window: Duration,
  states: PerCategory<FetchState>,
}

impl RequestThrottleGate {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      states: PerCategory::default(),
    }
  }

  pub fn should_fetch(&self, category: Category, force: bool, now: Instant) -> bool {
    if force {
      return true;
    }

    let state = &self.states[category];
    if state.in_flight {
      return false;
    }

    match state.last_attempt {
      Some(last) => now.saturating_duration_since(last) >= self.window,
      None => true,
    }
  }

  pub fn record_attempt(&mut self, category: Category, now: Instant) {
    let state = &mut self.states[category];
    state.in_flight = true;
    state.last_attempt = Some(now);
  }

  /// Mark the category's current fetch as resolved.
  pub fn finish(&mut self, category: Category) {
    self.states[category].in_flight = false;
  }

  pub fn is_in_flight(&self, category: Category) -> bool {
    self.states[category].in_flight
  }

  pub fn any_in_flight(&self) -> bool {
    self.states.values().any(|s| s.in_flight)
  }

  /// Clear every in-flight flag, keeping attempt times.
  pub fn clear_in_flight(&mut self) {
    for category in Category::ALL {
      self.states[category].in_flight = false;
    }
  }
}

impl Default for RequestThrottleGate {
  fn default() -> Self {
    Self::new(THROTTLE_WINDOW)
  }
}
