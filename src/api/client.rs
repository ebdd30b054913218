use crate::api::types::{Handler, RecordPatch, RequestRecord, RequestStatus, User};
use crate::api::TaskApi;
use crate::config::Config;
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// JSON-over-HTTP client for the task service
#[derive(Clone)]
pub struct HttpTaskApi {
  client: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpTaskApi {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token();

    // Url::join drops the last path segment unless the base ends in '/'
    let mut base = config.api.url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base =
      Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", config.api.url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
    let url = self.endpoint(path)?;
    debug!(%url, "GET");

    let response = self
      .authorize(self.client.get(url).query(query))
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  async fn send_json(&self, method: reqwest::Method, path: &str, body: Value) -> Result<()> {
    let url = self.endpoint(path)?;
    debug!(%url, %method, "sending");

    self
      .authorize(self.client.request(method, url).json(&body))
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    Ok(())
  }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
  async fn get_available_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>> {
    self
      .get_json("requests/available", &[("user", user_id)])
      .await
  }

  async fn get_assigned_requests(
    &self,
    user_id: &str,
    status_filter: Option<RequestStatus>,
  ) -> Result<Vec<RequestRecord>> {
    match status_filter {
      Some(status) => {
        self
          .get_json(
            "requests/assigned",
            &[("user", user_id), ("status", status.as_str())],
          )
          .await
      }
      None => {
        self
          .get_json("requests/assigned", &[("user", user_id)])
          .await
      }
    }
  }

  async fn get_submitted_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>> {
    self
      .get_json("requests/submitted", &[("user", user_id)])
      .await
  }

  async fn get_sent_back_requests(&self, user_id: &str) -> Result<Vec<RequestRecord>> {
    self
      .get_json("requests/sent-back", &[("user", user_id)])
      .await
  }

  async fn claim_request(&self, id: u64, user_id: &str) -> Result<()> {
    self
      .send_json(
        reqwest::Method::POST,
        &format!("requests/{}/claim", id),
        json!({ "userId": user_id }),
      )
      .await
  }

  async fn update_request_status(
    &self,
    id: u64,
    status: RequestStatus,
    user_id: &str,
    extra: Option<Value>,
  ) -> Result<()> {
    let mut body = json!({ "status": status, "userId": user_id });
    if let (Some(Value::Object(extra)), Some(map)) = (extra, body.as_object_mut()) {
      for (key, value) in extra {
        map.entry(key).or_insert(value);
      }
    }

    self
      .send_json(
        reqwest::Method::POST,
        &format!("requests/{}/status", id),
        body,
      )
      .await
  }

  async fn add_comment(
    &self,
    id: u64,
    user_id: &str,
    text: &str,
    is_send_back_reason: bool,
  ) -> Result<()> {
    self
      .send_json(
        reqwest::Method::POST,
        &format!("requests/{}/comments", id),
        json!({
          "userId": user_id,
          "text": text,
          "isSendBackReason": is_send_back_reason,
        }),
      )
      .await
  }

  async fn update_request_data(&self, id: u64, patch: &RecordPatch) -> Result<()> {
    let body =
      serde_json::to_value(patch).map_err(|e| eyre!("Failed to serialize patch: {}", e))?;
    self
      .send_json(reqwest::Method::PATCH, &format!("requests/{}", id), body)
      .await
  }

  async fn get_all_active_users(&self) -> Result<Vec<User>> {
    self.get_json("users/active", &[]).await
  }

  async fn get_handlers(&self) -> Result<Vec<Handler>> {
    self.get_json("handlers", &[]).await
  }
}
