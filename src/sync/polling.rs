//! Background refresh driven by a timer and visibility changes.
//!
//! On activation one forced refresh runs after the initial delay (so that
//! several controllers starting together do not all hit the service at
//! once), then a repeating interval takes over. Interval ticks only refresh
//! while visible and idle; a skipped tick is not queued. Becoming visible
//! schedules one debounced forced refresh, and every further visibility
//! event restarts that debounce.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::category::Category;
use crate::config::SyncConfig;

/// Whether the user can currently see the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
  Visible,
  Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
  Idle,
  Scheduled,
  Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
  Activate,
  RefreshStarted,
  RefreshFinished,
  Teardown,
}

impl PollState {
  /// Next state after `event`; events that do not apply leave it unchanged.
  pub fn on(self, event: PollEvent) -> PollState {
    match (self, event) {
      (_, PollEvent::Teardown) => PollState::Idle,
      (PollState::Idle, PollEvent::Activate) => PollState::Scheduled,
      (PollState::Scheduled, PollEvent::RefreshStarted) => PollState::Running,
      (PollState::Running, PollEvent::RefreshFinished) => PollState::Scheduled,
      (state, _) => state,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingTimings {
  pub initial_delay: Duration,
  pub interval: Duration,
  pub debounce: Duration,
}

impl From<&SyncConfig> for PollingTimings {
  fn from(config: &SyncConfig) -> Self {
    Self {
      initial_delay: config.initial_delay(),
      interval: config.poll_interval(),
      debounce: config.visibility_debounce(),
    }
  }
}

/// What the scheduler drives.
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
  fn any_in_flight(&self) -> bool;

  async fn refresh_all(&self, force: bool);

  /// Categories older than the freshness threshold.
  fn stale_categories(&self) -> Vec<Category> {
    Vec::new()
  }

  /// Invalidate every outstanding fetch.
  fn cancel_all(&self);
}

/// Running scheduler. Call `shutdown` to stop it.
pub struct PollingHandle {
  shutdown: CancellationToken,
  task: JoinHandle<()>,
  state: watch::Receiver<PollState>,
}

impl PollingHandle {
  pub fn state(&self) -> PollState {
    *self.state.borrow()
  }

  /// Stop timers and the visibility listener, then cancel in-flight fetches.
  pub async fn shutdown(self) {
    debug!(state = ?self.state(), "stopping polling");
    self.shutdown.cancel();
    if let Err(e) = self.task.await {
      debug!(error = %e, "polling task ended abnormally");
    }
  }
}

pub struct PollingScheduler<T: RefreshTarget> {
  target: Arc<T>,
  timings: PollingTimings,
  visibility: watch::Receiver<Visibility>,
  shutdown: CancellationToken,
  state: PollState,
  state_tx: watch::Sender<PollState>,
}

impl<T: RefreshTarget> PollingScheduler<T> {
  /// Activate polling for `target` on the current runtime.
  pub fn spawn(
    target: Arc<T>,
    timings: PollingTimings,
    visibility: watch::Receiver<Visibility>,
  ) -> PollingHandle {
    let shutdown = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(PollState::Idle);

    let scheduler = Self {
      target,
      timings,
      visibility,
      shutdown: shutdown.clone(),
      state: PollState::Idle,
      state_tx,
    };
    let task = tokio::spawn(scheduler.run());

    PollingHandle {
      shutdown,
      task,
      state: state_rx,
    }
  }

  fn transition(&mut self, event: PollEvent) {
    self.state = self.state.on(event);
    self.state_tx.send_replace(self.state);
  }

  fn is_visible(&self) -> bool {
    *self.visibility.borrow() == Visibility::Visible
  }

  async fn run(mut self) {
    self.transition(PollEvent::Activate);
    info!(
      initial_delay_ms = self.timings.initial_delay.as_millis() as u64,
      interval_ms = self.timings.interval.as_millis() as u64,
      "polling activated"
    );

    let start = Instant::now();
    let mut initial_at = Some(start + self.timings.initial_delay);
    let mut debounce_at: Option<Instant> = None;
    let mut listening = true;

    let mut interval = time::interval_at(start + self.timings.interval, self.timings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        biased;
        _ = self.shutdown.cancelled() => break,
        _ = time::sleep_until(initial_at.unwrap_or(start)), if initial_at.is_some() => {
          initial_at = None;
          if !self.fire(true, "initial").await {
            break;
          }
        }
        changed = self.visibility.changed(), if listening => {
          if changed.is_err() {
            debug!("visibility source closed");
            listening = false;
            continue;
          }
          let visible = *self.visibility.borrow_and_update() == Visibility::Visible;
          debounce_at = visible.then(|| Instant::now() + self.timings.debounce);
        }
        _ = time::sleep_until(debounce_at.unwrap_or(start)), if debounce_at.is_some() => {
          debounce_at = None;
          if self.target.any_in_flight() {
            debug!("visibility refresh skipped, fetch in flight");
          } else if !self.fire(true, "visibility").await {
            break;
          }
        }
        _ = interval.tick() => {
          let stale = self.target.stale_categories();
          if !stale.is_empty() {
            debug!(?stale, "stale categories");
          }
          if !self.is_visible() {
            debug!("poll tick skipped, not visible");
          } else if self.target.any_in_flight() {
            debug!("poll tick skipped, fetch in flight");
          } else if !self.fire(false, "interval").await {
            break;
          }
        }
      }
    }

    self.target.cancel_all();
    self.transition(PollEvent::Teardown);
    info!("polling stopped");
  }

  /// Run one refresh; false if shutdown arrived first.
  async fn fire(&mut self, force: bool, reason: &'static str) -> bool {
    self.transition(PollEvent::RefreshStarted);
    debug!(reason, force, "background refresh");

    let target = Arc::clone(&self.target);
    let finished = tokio::select! {
      biased;
      _ = self.shutdown.cancelled() => false,
      _ = target.refresh_all(force) => true,
    };

    if finished {
      self.transition(PollEvent::RefreshFinished);
    }
    finished
  }
}
