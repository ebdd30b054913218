//! Cached secondary reference data: active users and request handlers.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::ttl::TtlCache;
use crate::api::{Handler, TaskApi, User};

pub const USERS_KEY: &str = "cachedUsers";
pub const HANDLERS_KEY: &str = "cachedHandlers";

/// Both reference lists, each empty if its fetch failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSnapshot {
  pub users: Vec<User>,
  pub handlers: Vec<Handler>,
}

/// Cache-first loader for reference lists.
#[derive(Clone)]
pub struct ReferenceData {
  api: Arc<dyn TaskApi>,
  cache: TtlCache,
  max_age: Duration,
}

impl ReferenceData {
  pub fn new(api: Arc<dyn TaskApi>, cache: TtlCache, max_age: Duration) -> Self {
    Self {
      api,
      cache,
      max_age,
    }
  }

  pub async fn users(&self) -> Result<Vec<User>> {
    let api = Arc::clone(&self.api);
    self
      .fetch_cached(USERS_KEY, || async move { api.get_all_active_users().await })
      .await
  }

  pub async fn handlers(&self) -> Result<Vec<Handler>> {
    let api = Arc::clone(&self.api);
    self
      .fetch_cached(HANDLERS_KEY, || async move { api.get_handlers().await })
      .await
  }

  /// Load both lists concurrently.
  ///
  /// A failure in one branch leaves that list empty and does not affect
  /// the other.
  pub async fn load_all(&self) -> ReferenceSnapshot {
    let (users, handlers) = tokio::join!(self.users(), self.handlers());

    let users = users.unwrap_or_else(|e| {
      warn!(error = %e, "failed to load active users");
      Vec::new()
    });
    let handlers = handlers.unwrap_or_else(|e| {
      warn!(error = %e, "failed to load handlers");
      Vec::new()
    });

    ReferenceSnapshot { users, handlers }
  }

  /// Serve from cache while fresh, otherwise fetch and cache.
  async fn fetch_cached<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<Vec<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if let Some(cached) = self.cache.get::<Vec<T>>(key, self.max_age) {
      debug!(key, count = cached.len(), "reference data served from cache");
      return Ok(cached);
    }

    let data = fetcher().await?;
    self.cache.put(key, &data);
    Ok(data)
  }
}
