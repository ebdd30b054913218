//! Serde types for records and reference data returned by the task service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Workflow status of a request.
///
/// Anything the service sends outside the known set deserializes to
/// `Unknown` and is ignored by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
  New,
  Assigned,
  Submitted,
  SentBack,
  Completed,
  #[serde(other)]
  Unknown,
}

impl RequestStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      RequestStatus::New => "new",
      RequestStatus::Assigned => "assigned",
      RequestStatus::Submitted => "submitted",
      RequestStatus::SentBack => "sent_back",
      RequestStatus::Completed => "completed",
      RequestStatus::Unknown => "unknown",
    }
  }
}

impl fmt::Display for RequestStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A work item as returned by the task service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
  pub id: u64,
  pub status: RequestStatus,
  #[serde(default)]
  pub assigned_to: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub title: Option<String>,
  // Fields this client never inspects
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

// Builders for fixtures
#[cfg(test)]
impl RequestRecord {
  pub fn new(id: u64, status: RequestStatus) -> Self {
    Self {
      id,
      status,
      assigned_to: None,
      created_at: None,
      updated_at: None,
      title: None,
      extra: BTreeMap::new(),
    }
  }

  pub fn assigned_to(mut self, user: impl Into<String>) -> Self {
    self.assigned_to = Some(user.into());
    self
  }

  pub fn with_times(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
    self.created_at = Some(created_at);
    self.updated_at = Some(updated_at);
    self
  }

  pub fn with_title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }
}

/// Active portal user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub display_name: String,
  #[serde(default)]
  pub email: Option<String>,
}

/// Someone who can be assigned requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
  pub id: String,
  pub display_name: String,
  #[serde(default)]
  pub active_count: u32,
}

/// Partial update of a request's data.
///
/// `assigned_to` distinguishes "leave alone" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<Option<String>>,
  #[serde(flatten)]
  pub fields: BTreeMap<String, serde_json::Value>,
}

impl RecordPatch {
  pub fn unassign() -> Self {
    Self {
      assigned_to: Some(None),
      fields: BTreeMap::new(),
    }
  }

  #[cfg(test)]
  pub fn field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
    self.fields.insert(name.into(), value);
    self
  }

  /// True when this patch clears the assignee.
  pub fn clears_assignee(&self) -> bool {
    matches!(self.assigned_to, Some(None))
  }

  /// True when this patch touches anything besides clearing the assignee.
  pub fn has_other_changes(&self) -> bool {
    !self.fields.is_empty() || matches!(self.assigned_to, Some(Some(_)))
  }
}
