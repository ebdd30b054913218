//! Remote task service: the trait the sync core consumes and its HTTP client.

pub mod client;
pub mod types;

use async_trait::async_trait;
use color_eyre::Result;

pub use client::HttpTaskApi;
pub use types::{Handler, RecordPatch, RequestRecord, RequestStatus, User};

/// Operations offered by the remote task service.
///
/// The sync controller only ever talks to the service through this trait,
/// so tests can swap in a scripted implementation.
#[async_trait]
pub trait TaskApi: Send + Sync + 'static {
  async fn get_available_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>>;

  async fn get_assigned_requests(
    &self,
    user_id: &str,
    status_filter: Option<RequestStatus>,
  ) -> Result<Vec<RequestRecord>>;

  async fn get_submitted_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>>;

  async fn get_sent_back_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>>;

  async fn claim_request(&self, id: u64, user_id: &str) -> Result<()>;

  async fn update_request_status(
    &self,
    id: u64,
    status: RequestStatus,
    user_id: &str,
    extra: Option<serde_json::Value>,
  ) -> Result<()>;

  async fn add_comment(
    &self,
    id: u64,
    user_id: &str,
    text: &str,
    is_send_back_reason: bool,
  ) -> Result<()>;

  async fn update_request_data(&self, id: u64, patch: &RecordPatch) -> Result<()>;

  async fn get_all_active_users(&self) -> Result<Vec<User>>;

  async fn get_handlers(&self) -> Result<Vec<Handler>>;
}
