//! Scripted in-memory task service for tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::notify::{Notice, Notifier};
use crate::api::{Handler, RecordPatch, RequestRecord, RequestStatus, TaskApi, User};

#[derive(Default)]
struct FakeState {
  records: Vec<RequestRecord>,
  users: Vec<User>,
  handlers: Vec<Handler>,
  calls: HashMap<&'static str, usize>,
  log: Vec<(String, Instant)>,
  failing: HashSet<&'static str>,
  delays: HashMap<&'static str, Duration>,
  scripted: HashMap<&'static str, Vec<RequestRecord>>,
}

/// Task service backed by a record list, with per-operation failure,
/// latency and call counting.
#[derive(Default)]
pub struct FakeApi {
  state: Mutex<FakeState>,
}

impl FakeApi {
  pub fn new() -> Self {
    Self::default()
  }

  /// One or two requests in every category for user `u1`.
  pub fn seeded() -> Self {
    let created = Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap();
    let api = Self::new();
    api.set_records(vec![
      RequestRecord::new(40, RequestStatus::New).with_title("Laptop request"),
      RequestRecord::new(41, RequestStatus::New).with_title("Badge renewal"),
      RequestRecord::new(42, RequestStatus::New).with_title("Parking permit"),
      RequestRecord::new(50, RequestStatus::Assigned).assigned_to("u1"),
      RequestRecord::new(51, RequestStatus::Assigned).assigned_to("u2"),
      RequestRecord::new(60, RequestStatus::Submitted).assigned_to("u1"),
      RequestRecord::new(70, RequestStatus::SentBack).assigned_to("u1"),
      RequestRecord::new(80, RequestStatus::Completed)
        .assigned_to("u1")
        .with_times(created, created + ChronoDuration::hours(6)),
    ]);
    api
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
    self.state.lock().unwrap()
  }

  pub fn set_records(&self, records: Vec<RequestRecord>) {
    self.lock().records = records;
  }

  pub fn set_users(&self, users: Vec<User>) {
    self.lock().users = users;
  }

  pub fn set_handlers(&self, handlers: Vec<Handler>) {
    self.lock().handlers = handlers;
  }

  /// Make `op` reject until `recover` is called.
  pub fn fail(&self, op: &'static str) {
    self.lock().failing.insert(op);
  }

  pub fn recover(&self, op: &'static str) {
    self.lock().failing.remove(op);
  }

  pub fn delay(&self, op: &'static str, latency: Duration) {
    self.lock().delays.insert(op, latency);
  }

  /// Return exactly `records` from a fetch operation.
  pub fn script(&self, op: &'static str, records: Vec<RequestRecord>) {
    self.lock().scripted.insert(op, records);
  }

  pub fn calls(&self, op: &str) -> usize {
    self.lock().calls.get(op).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.lock().calls.values().sum()
  }

  /// Every call as `(label, issued_at)`, in issue order.
  pub fn call_log(&self) -> Vec<(String, Instant)> {
    self.lock().log.clone()
  }

  pub fn clear_log(&self) {
    self.lock().log.clear();
  }

  pub fn record(&self, id: u64) -> Option<RequestRecord> {
    self.lock().records.iter().find(|r| r.id == id).cloned()
  }

  async fn enter(&self, op: &'static str, label: String) -> Result<()> {
    let (latency, failing) = {
      let mut state = self.lock();
      *state.calls.entry(op).or_default() += 1;
      state.log.push((label, Instant::now()));
      (state.delays.get(op).copied(), state.failing.contains(op))
    };

    if let Some(latency) = latency {
      tokio::time::sleep(latency).await;
    }

    if failing {
      Err(eyre!("{} unavailable", op))
    } else {
      Ok(())
    }
  }

  fn select(
    &self,
    op: &'static str,
    predicate: impl Fn(&RequestRecord) -> bool,
  ) -> Vec<RequestRecord> {
    let state = self.lock();
    if let Some(scripted) = state.scripted.get(op) {
      return scripted.clone();
    }
    state.records.iter().filter(|r| predicate(r)).cloned().collect()
  }

  fn update(&self, id: u64, apply: impl FnOnce(&mut RequestRecord)) -> Result<()> {
    let mut state = self.lock();
    let record = state
      .records
      .iter_mut()
      .find(|r| r.id == id)
      .ok_or_else(|| eyre!("request {} not found", id))?;
    apply(record);
    Ok(())
  }
}

#[async_trait]
impl TaskApi for FakeApi {
  async fn get_available_requests(&self, _user_id: &str) -> Result<Vec<RequestRecord>> {
    let op = "get_available_requests";
    self.enter(op, op.to_string()).await?;
    Ok(self.select(op, |r| r.status == RequestStatus::New))
  }

  async fn get_assigned_requests(
    &self,
    user_id: &str,
    status_filter: Option<RequestStatus>,
  ) -> Result<Vec<RequestRecord>> {
    let op = "get_assigned_requests";
    let label = match status_filter {
      Some(status) => format!("{}({})", op, status),
      None => op.to_string(),
    };
    self.enter(op, label).await?;
    Ok(self.select(op, |r| {
      r.assigned_to.as_deref() == Some(user_id) && status_filter.map_or(true, |s| r.status == s)
    }))
  }

  async fn get_submitted_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>> {
    let op = "get_submitted_requests";
    self.enter(op, op.to_string()).await?;
    Ok(self.select(op, |r| {
      r.assigned_to.as_deref() == Some(user_id) && r.status == RequestStatus::Submitted
    }))
  }

  async fn get_sent_back_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>> {
    let op = "get_sent_back_requests";
    self.enter(op, op.to_string()).await?;
    Ok(self.select(op, |r| {
      r.assigned_to.as_deref() == Some(user_id) && r.status == RequestStatus::SentBack
    }))
  }

  async fn claim_request(&self, id: u64, user_id: &str) -> Result<()> {
    let op = "claim_request";
    self.enter(op, format!("{}({})", op, id)).await?;
    self.update(id, |r| {
      r.status = RequestStatus::Assigned;
      r.assigned_to = Some(user_id.to_string());
    })
  }

  async fn update_request_status(
    &self,
    id: u64,
    status: RequestStatus,
    _user_id: &str,
    _extra: Option<serde_json::Value>,
  ) -> Result<()> {
    let op = "update_request_status";
    self.enter(op, format!("{}({}, {})", op, id, status)).await?;
    self.update(id, |r| {
      r.status = status;
      if status == RequestStatus::New {
        r.assigned_to = None;
      }
    })
  }

  async fn add_comment(
    &self,
    id: u64,
    user_id: &str,
    text: &str,
    is_send_back_reason: bool,
  ) -> Result<()> {
    let op = "add_comment";
    self.enter(op, format!("{}({})", op, id)).await?;
    self.update(id, |r| {
      let comments = r
        .extra
        .entry("comments".to_string())
        .or_insert_with(|| serde_json::json!([]));
      if let Some(list) = comments.as_array_mut() {
        list.push(serde_json::json!({
          "userId": user_id,
          "text": text,
          "isSendBackReason": is_send_back_reason,
        }));
      }
    })
  }

  async fn update_request_data(&self, id: u64, patch: &RecordPatch) -> Result<()> {
    let op = "update_request_data";
    self.enter(op, format!("{}({})", op, id)).await?;
    self.update(id, |r| {
      if let Some(assigned_to) = &patch.assigned_to {
        r.assigned_to = assigned_to.clone();
        if assigned_to.is_none() {
          r.status = RequestStatus::New;
        }
      }
      for (name, value) in &patch.fields {
        r.extra.insert(name.clone(), value.clone());
      }
    })
  }

  async fn get_all_active_users(&self) -> Result<Vec<User>> {
    let op = "get_all_active_users";
    self.enter(op, op.to_string()).await?;
    Ok(self.lock().users.clone())
  }

  async fn get_handlers(&self) -> Result<Vec<Handler>> {
    let op = "get_handlers";
    self.enter(op, op.to_string()).await?;
    Ok(self.lock().handlers.clone())
  }
}

/// Notifier that keeps everything it was told.
#[derive(Default)]
pub struct RecordingNotifier {
  notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().unwrap().clone()
  }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, notice: Notice) {
    self.notices.lock().unwrap().push(notice);
  }
}
