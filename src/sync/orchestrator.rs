//! Multi-category refresh with per-category error isolation.
//!
//! Two strategies are supported:
//! - `Concurrent` issues every category at once and inspects each outcome
//!   on its own
//! - `Ordered` issues categories in a fixed order with a pause between
//!   requests, bounding backend load. Only issuance is paced: each
//!   response is applied as soon as it arrives. A throttled category still
//!   takes its slot, so a fully throttled pass waits out every delay.
//!
//! Per category the flow is: gate check, new cancellation token, attempt
//! recorded (all under one lock), remote call, token check, store write.

use color_eyre::Result;
use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::cancel::CancellationRegistry;
use super::categorizer::classify;
use super::category::Category;
use super::store::CategorizedStore;
use super::throttle::RequestThrottleGate;
use crate::api::{RequestRecord, RequestStatus, TaskApi};
use crate::config::{StrategyKind, SyncConfig};
use crate::error::SyncError;

/// Everything a fetch reads or writes, behind a single lock.
///
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct SyncState {
  pub store: CategorizedStore,
  pub gate: RequestThrottleGate,
  pub registry: CancellationRegistry,
}

impl SyncState {
  pub fn new(config: &SyncConfig) -> Self {
    Self {
      store: CategorizedStore::new(config.stale_after()),
      gate: RequestThrottleGate::new(config.throttle()),
      registry: CancellationRegistry::new(),
    }
  }
}

pub type SharedState = Arc<Mutex<SyncState>>;

/// Lock the shared state. A poisoned lock still holds consistent data
/// because no writer panics midway through an update.
pub fn lock_state(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
  Concurrent,
  Ordered { delay: Duration },
}

impl From<&SyncConfig> for RefreshStrategy {
  fn from(config: &SyncConfig) -> Self {
    match config.strategy {
      StrategyKind::Concurrent => RefreshStrategy::Concurrent,
      StrategyKind::Ordered => RefreshStrategy::Ordered {
        delay: config.request_delay(),
      },
    }
  }
}

/// Result of fetching one category.
#[derive(Debug)]
pub enum CategoryOutcome {
  /// Bucket replaced with this many records
  Updated(usize),
  /// Gate refused; no request issued
  Throttled,
  /// A newer fetch took over; result discarded
  Superseded,
  /// The service rejected the request; bucket left as it was
  Failed(SyncError),
}

/// What a refresh pass did, per category.
#[derive(Debug, Default)]
pub struct RefreshReport {
  pub updated: Vec<Category>,
  /// Records written across the updated categories
  pub fetched: usize,
  pub throttled: Vec<Category>,
  pub superseded: Vec<Category>,
  pub failed: Vec<(Category, SyncError)>,
}

impl RefreshReport {
  fn record(&mut self, category: Category, outcome: CategoryOutcome) {
    match outcome {
      CategoryOutcome::Updated(count) => {
        self.updated.push(category);
        self.fetched += count;
      }
      CategoryOutcome::Throttled => self.throttled.push(category),
      CategoryOutcome::Superseded => self.superseded.push(category),
      CategoryOutcome::Failed(err) => self.failed.push((category, err)),
    }
  }

  /// Number of categories for which a request actually went out.
  #[cfg(test)]
  pub fn requests_issued(&self) -> usize {
    self.updated.len() + self.superseded.len() + self.failed.len()
  }

  pub fn has_failures(&self) -> bool {
    !self.failed.is_empty()
  }
}

/// Runs category fetches against the remote service.
#[derive(Clone)]
pub struct FetchOrchestrator {
  api: Arc<dyn TaskApi>,
  user_id: String,
  state: SharedState,
  strategy: RefreshStrategy,
}

impl FetchOrchestrator {
  pub fn new(
    api: Arc<dyn TaskApi>,
    user_id: String,
    state: SharedState,
    strategy: RefreshStrategy,
  ) -> Self {
    Self {
      api,
      user_id,
      state,
      strategy,
    }
  }

  /// Refresh `categories` with the configured strategy.
  pub async fn refresh(&self, categories: &[Category], force: bool) -> RefreshReport {
    match self.strategy {
      RefreshStrategy::Concurrent => self.refresh_concurrent(categories, force).await,
      RefreshStrategy::Ordered { delay } => self.refresh_ordered(categories, force, delay).await,
    }
  }

  pub async fn refresh_concurrent(&self, categories: &[Category], force: bool) -> RefreshReport {
    let outcomes = join_all(
      categories
        .iter()
        .map(|&category| async move { (category, self.fetch_category(category, force).await) }),
    )
    .await;

    Self::report(outcomes)
  }

  /// Issue in `FETCH_ORDER`, `delay` apart.
  pub async fn refresh_ordered(
    &self,
    categories: &[Category],
    force: bool,
    delay: Duration,
  ) -> RefreshReport {
    let start = Instant::now();
    let ordered = Category::FETCH_ORDER
      .into_iter()
      .filter(|c| categories.contains(c));

    let outcomes = join_all(ordered.enumerate().map(|(slot, category)| async move {
      time::sleep_until(start + delay * slot as u32).await;
      (category, self.fetch_category(category, force).await)
    }))
    .await;

    Self::report(outcomes)
  }

  fn report(outcomes: Vec<(Category, CategoryOutcome)>) -> RefreshReport {
    let mut report = RefreshReport::default();
    for (category, outcome) in outcomes {
      report.record(category, outcome);
    }
    report
  }

  /// Fetch one category if the gate allows it.
  pub async fn fetch_category(&self, category: Category, force: bool) -> CategoryOutcome {
    let token = {
      let mut state = lock_state(&self.state);
      let now = Instant::now();
      if !state.gate.should_fetch(category, force, now) {
        debug!(%category, "fetch throttled");
        return CategoryOutcome::Throttled;
      }
      let token = state.registry.begin(category);
      state.gate.record_attempt(category, now);
      token
    };

    debug!(%category, generation = token.generation(), force, "fetching");

    let result = tokio::select! {
      biased;
      _ = token.cancelled() => None,
      result = self.request(category) => Some(result),
    };

    let mut state = lock_state(&self.state);
    let result = match result {
      Some(result) if token.is_current() => result,
      _ => {
        debug!(%category, generation = token.generation(), "{}", SyncError::Cancelled);
        return CategoryOutcome::Superseded;
      }
    };

    state.registry.release(&token);
    state.gate.finish(category);

    match result {
      Ok(records) => {
        let received = records.len();
        let mut classification = classify(records);
        let records = classification.buckets.take(category);
        if records.len() != received {
          debug!(
            %category,
            unknown_status = received - classification.stats.total_count,
            other_status = classification.stats.total_count - records.len(),
            "records left out"
          );
        }
        let count = records.len();
        state.store.set_category(category, records, Instant::now());
        debug!(%category, count, "category updated");
        CategoryOutcome::Updated(count)
      }
      Err(e) => {
        let err = SyncError::request(category, &e);
        warn!(%category, error = %err, "fetch failed, keeping previous data");
        CategoryOutcome::Failed(err)
      }
    }
  }

  async fn request(&self, category: Category) -> Result<Vec<RequestRecord>> {
    let user_id = self.user_id.as_str();
    match category {
      Category::Available => self.api.get_available_requests(user_id).await,
      Category::Assigned => {
        self
          .api
          .get_assigned_requests(user_id, Some(RequestStatus::Assigned))
          .await
      }
      Category::Completed => {
        self
          .api
          .get_assigned_requests(user_id, Some(RequestStatus::Completed))
          .await
      }
      Category::Submitted => self.api.get_submitted_requests(user_id).await,
      Category::SentBack => self.api.get_sent_back_requests(user_id).await,
    }
  }
}
