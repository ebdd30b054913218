use async_trait::async_trait;
use color_eyre::Result;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::categorizer::Stats;
use super::category::{Category, PerCategory};
use super::invalidation::{invalidated_categories, MutationEffect};
use super::notify::{Notice, Notifier};
use super::orchestrator::{
  lock_state, FetchOrchestrator, RefreshReport, RefreshStrategy, SharedState, SyncState,
};
use super::polling::{PollingHandle, PollingScheduler, PollingTimings, RefreshTarget, Visibility};
use crate::api::{RecordPatch, RequestRecord, RequestStatus, TaskApi};
use crate::cache::{ReferenceData, ReferenceSnapshot};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Point-in-time copy of everything the dashboard renders.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
  pub buckets: PerCategory<Vec<RequestRecord>>,
  pub stats: Stats,
  pub in_flight: PerCategory<bool>,
  pub stale: PerCategory<bool>,
  pub any_in_flight: bool,
}

/// Owns the categorized store and coordinates fetches, polling and
/// mutations for one user.
pub struct SyncController {
  user_id: String,
  api: Arc<dyn TaskApi>,
  config: SyncConfig,
  state: SharedState,
  orchestrator: FetchOrchestrator,
  notifier: Arc<dyn Notifier>,
  reference: Option<ReferenceData>,
}

impl SyncController {
  pub fn new(
    api: Arc<dyn TaskApi>,
    user_id: impl Into<String>,
    config: SyncConfig,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let user_id = user_id.into();
    let state: SharedState = Arc::new(Mutex::new(SyncState::new(&config)));
    let orchestrator = FetchOrchestrator::new(
      Arc::clone(&api),
      user_id.clone(),
      Arc::clone(&state),
      RefreshStrategy::from(&config),
    );

    Self {
      user_id,
      api,
      config,
      state,
      orchestrator,
      notifier,
      reference: None,
    }
  }

  pub fn with_reference(mut self, reference: ReferenceData) -> Self {
    self.reference = Some(reference);
    self
  }

  pub fn user_id(&self) -> &str {
    &self.user_id
  }

  /// Start background polling. The returned handle tears it down.
  pub fn activate(self: &Arc<Self>, visibility: watch::Receiver<Visibility>) -> PollingHandle {
    PollingScheduler::spawn(
      Arc::clone(self),
      PollingTimings::from(&self.config),
      visibility,
    )
  }

  /// Refresh every category with the configured strategy.
  pub async fn refresh_all(&self, force: bool) -> RefreshReport {
    let report = self.orchestrator.refresh(&Category::ALL, force).await;
    if report.has_failures() {
      warn!(
        failed = report.failed.len(),
        updated = report.updated.len(),
        fetched = report.fetched,
        "refresh finished with failures"
      );
    } else {
      debug!(
        updated = report.updated.len(),
        throttled = report.throttled.len(),
        fetched = report.fetched,
        "refresh finished"
      );
    }
    report
  }

  /// Refresh a subset concurrently.
  pub async fn refresh_categories(&self, categories: &[Category], force: bool) -> RefreshReport {
    self.orchestrator.refresh_concurrent(categories, force).await
  }

  #[cfg(test)]
  pub async fn refresh_category(
    &self,
    category: Category,
    force: bool,
  ) -> super::orchestrator::CategoryOutcome {
    self.orchestrator.fetch_category(category, force).await
  }

  pub fn any_in_flight(&self) -> bool {
    lock_state(&self.state).gate.any_in_flight()
  }

  #[cfg(test)]
  pub fn is_stale(&self, category: Category) -> bool {
    lock_state(&self.state).store.is_stale(category, Instant::now())
  }

  pub fn snapshot(&self) -> SyncSnapshot {
    let state = lock_state(&self.state);
    let now = Instant::now();

    SyncSnapshot {
      buckets: state.store.buckets().clone(),
      stats: state.store.stats(),
      in_flight: PerCategory::from_fn(|c| state.gate.is_in_flight(c)),
      stale: PerCategory::from_fn(|c| state.store.is_stale(c, now)),
      any_in_flight: state.gate.any_in_flight(),
    }
  }

  /// Invalidate every outstanding fetch and clear in-flight flags.
  pub fn cancel_all(&self) {
    let mut state = lock_state(&self.state);
    state.registry.cancel_all();
    state.gate.clear_in_flight();
  }

  /// Active users and handlers, cache-first.
  pub async fn load_reference(&self) -> ReferenceSnapshot {
    match &self.reference {
      Some(reference) => reference.load_all().await,
      None => ReferenceSnapshot::default(),
    }
  }

  pub async fn claim_request(&self, id: u64) -> SyncResult<RefreshReport> {
    let call = self.api.claim_request(id, &self.user_id);
    self
      .mutate("claim request", id, &[MutationEffect::Claimed], call)
      .await
  }

  pub async fn update_request_status(
    &self,
    id: u64,
    status: RequestStatus,
    extra: Option<serde_json::Value>,
  ) -> SyncResult<RefreshReport> {
    let call = self
      .api
      .update_request_status(id, status, &self.user_id, extra);
    self
      .mutate(
        "update request status",
        id,
        &[MutationEffect::StatusChanged(status)],
        call,
      )
      .await
  }

  pub async fn add_comment(
    &self,
    id: u64,
    text: &str,
    is_send_back_reason: bool,
  ) -> SyncResult<RefreshReport> {
    let call = self
      .api
      .add_comment(id, &self.user_id, text, is_send_back_reason);
    self
      .mutate(
        "add comment",
        id,
        &[MutationEffect::Comment {
          send_back_reason: is_send_back_reason,
        }],
        call,
      )
      .await
  }

  pub async fn update_request_data(&self, id: u64, patch: &RecordPatch) -> SyncResult<RefreshReport> {
    let effects = MutationEffect::for_patch(patch);
    let call = self.api.update_request_data(id, patch);
    self.mutate("update request", id, &effects, call).await
  }

  /// Run a mutation, then refetch only what it can have changed.
  ///
  /// A rejected call is returned to the caller as-is: nothing is retried
  /// and nothing is refetched.
  async fn mutate(
    &self,
    action: &'static str,
    id: u64,
    effects: &[MutationEffect],
    call: impl Future<Output = Result<()>>,
  ) -> SyncResult<RefreshReport> {
    if let Err(e) = call.await {
      let err = SyncError::mutation(action, &e);
      warn!(action, request_id = id, error = %e, "mutation failed");
      self.notifier.notify(Notice::Failure(err.to_string()));
      return Err(err);
    }

    let categories = invalidated_categories(effects);
    info!(action, request_id = id, ?categories, "mutation applied");
    self
      .notifier
      .notify(Notice::Success(format!("Request #{}: {} done", id, action)));

    Ok(self.refresh_categories(&categories, true).await)
  }
}

#[async_trait]
impl RefreshTarget for SyncController {
  fn any_in_flight(&self) -> bool {
    SyncController::any_in_flight(self)
  }

  async fn refresh_all(&self, force: bool) {
    SyncController::refresh_all(self, force).await;
  }

  fn stale_categories(&self) -> Vec<Category> {
    let state = lock_state(&self.state);
    let now = Instant::now();
    Category::ALL
      .into_iter()
      .filter(|c| state.store.is_stale(*c, now))
      .collect()
  }

  fn cancel_all(&self) {
    SyncController::cancel_all(self);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStore, TtlCache};
  use crate::sync::orchestrator::CategoryOutcome;
  use crate::sync::testing::{FakeApi, RecordingNotifier};
  use std::time::Duration;
  use tokio::time;

  fn controller(api: Arc<FakeApi>) -> (Arc<SyncController>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = SyncController::new(api, "u1", SyncConfig::default(), notifier.clone());
    (Arc::new(controller), notifier)
  }

  fn ids(snapshot: &SyncSnapshot, category: Category) -> Vec<u64> {
    snapshot.buckets[category].iter().map(|r| r.id).collect()
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_all_fills_every_bucket() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api);

    controller.refresh_all(false).await;
    let snapshot = controller.snapshot();

    assert_eq!(ids(&snapshot, Category::Available), vec![40, 41, 42]);
    assert_eq!(ids(&snapshot, Category::Assigned), vec![50]);
    assert_eq!(ids(&snapshot, Category::Submitted), vec![60]);
    assert_eq!(ids(&snapshot, Category::SentBack), vec![70]);
    assert_eq!(ids(&snapshot, Category::Completed), vec![80]);
    assert_eq!(snapshot.stats.total_count, 7);
    assert_eq!(snapshot.stats.completed_count, 1);
    assert_eq!(snapshot.stats.average_resolution_hours, 6.0);
    assert!(!snapshot.any_in_flight);
    assert!(snapshot.stale.values().all(|s| !s));
  }

  #[tokio::test(start_paused = true)]
  async fn test_categories_go_stale_after_five_minutes() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api);
    assert!(controller.is_stale(Category::Assigned));

    controller.refresh_all(false).await;
    assert!(!controller.is_stale(Category::Assigned));

    time::sleep(Duration::from_millis(300_000)).await;
    assert!(!controller.is_stale(Category::Assigned));
    time::sleep(Duration::from_millis(1)).await;
    assert!(controller.is_stale(Category::Assigned));
    assert_eq!(controller.stale_categories().len(), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_completing_refetches_assigned_and_completed_only() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, notifier) = controller(api.clone());
    controller.refresh_all(false).await;
    api.clear_log();

    let report = controller
      .update_request_status(50, RequestStatus::Completed, None)
      .await
      .unwrap();

    let labels: Vec<String> = api.call_log().into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels[0], "update_request_status(50, completed)");
    assert!(labels.contains(&"get_assigned_requests(assigned)".to_string()));
    assert!(labels.contains(&"get_assigned_requests(completed)".to_string()));
    assert_eq!(report.updated, vec![Category::Assigned, Category::Completed]);

    let snapshot = controller.snapshot();
    assert!(ids(&snapshot, Category::Assigned).is_empty());
    assert_eq!(ids(&snapshot, Category::Completed), vec![50, 80]);
    assert!(matches!(notifier.notices().as_slice(), [Notice::Success(_)]));
  }

  #[tokio::test(start_paused = true)]
  async fn test_claim_moves_request_from_available_to_assigned() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api.clone());
    controller.refresh_all(false).await;
    assert!(ids(&controller.snapshot(), Category::Available).contains(&42));
    api.clear_log();

    // Within the throttle window: the refetch must still go out
    time::sleep(Duration::from_secs(1)).await;
    let report = controller.claim_request(42).await.unwrap();

    assert_eq!(report.updated, vec![Category::Available, Category::Assigned]);
    assert_eq!(api.calls("get_submitted_requests"), 1);
    let snapshot = controller.snapshot();
    assert!(!ids(&snapshot, Category::Available).contains(&42));
    assert!(ids(&snapshot, Category::Assigned).contains(&42));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_mutation_is_reported_without_refetch() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, notifier) = controller(api.clone());
    api.fail("claim_request");

    let err = controller.claim_request(42).await.unwrap_err();
    match &err {
      SyncError::Mutation { action, message } => {
        assert_eq!(*action, "claim request");
        assert!(!message.is_empty());
      }
      other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(api.total_calls(), 1);
    assert_eq!(api.calls("claim_request"), 1);
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_failure());
    assert_eq!(notices[0].message(), err.to_string());
    assert!(notices[0].message().starts_with("Could not claim request: "));
  }

  #[tokio::test(start_paused = true)]
  async fn test_send_back_comment_refetches_sent_back() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api.clone());

    let report = controller
      .add_comment(50, "Missing cost centre", true)
      .await
      .unwrap();
    assert_eq!(report.updated, vec![Category::Assigned, Category::SentBack]);

    let report = controller.add_comment(50, "Looking into it", false).await.unwrap();
    assert_eq!(report.updated, vec![Category::Assigned]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_unassign_refetches_available() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api.clone());
    controller.refresh_all(false).await;

    let report = controller
      .update_request_data(50, &RecordPatch::unassign())
      .await
      .unwrap();
    assert_eq!(report.updated, vec![Category::Available]);
    assert!(ids(&controller.snapshot(), Category::Available).contains(&50));
  }

  #[tokio::test(start_paused = true)]
  async fn test_activation_hydrates_after_initial_delay() {
    let api = Arc::new(FakeApi::seeded());
    let (controller, _) = controller(api.clone());
    let (_tx, rx) = watch::channel(Visibility::Visible);

    let handle = controller.activate(rx);
    time::sleep(Duration::from_millis(1_900)).await;
    assert_eq!(api.total_calls(), 0);

    time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.snapshot().stats.total_count, 7);

    handle.shutdown().await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_teardown_discards_in_flight_results() {
    let api = Arc::new(FakeApi::seeded());
    api.delay("get_available_requests", Duration::from_secs(5));
    let (controller, _) = controller(api.clone());

    let pending = {
      let controller = Arc::clone(&controller);
      tokio::spawn(async move { controller.refresh_category(Category::Available, false).await })
    };
    time::sleep(Duration::from_secs(1)).await;
    assert!(controller.any_in_flight());

    controller.cancel_all();
    assert!(matches!(pending.await.unwrap(), CategoryOutcome::Superseded));
    assert!(!controller.any_in_flight());
    assert!(controller.snapshot().buckets[Category::Available].is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_reference_data_is_loaded_through_cache() {
    let api = Arc::new(FakeApi::seeded());
    let cache = TtlCache::new(Arc::new(MemoryStore::new()));
    let reference = ReferenceData::new(api.clone(), cache, Duration::from_secs(600));
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = SyncController::new(api.clone(), "u1", SyncConfig::default(), notifier)
      .with_reference(reference);

    controller.load_reference().await;
    controller.load_reference().await;
    assert_eq!(api.calls("get_handlers"), 1);
    assert_eq!(api.calls("get_all_active_users"), 1);
  }
}
