//! Expiring cache over a session store.
//!
//! Each entry is kept as two items: `<key>` holds the JSON payload and
//! `<key>_timestamp` the write time in epoch milliseconds. Age is checked
//! against a caller-supplied maximum on every read, never at write time.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::storage::SessionStore;
use crate::error::SyncError;

/// Wall-clock milliseconds derived from the runtime's monotonic clock.
///
/// Anchoring to `tokio::time::Instant` lets paused-time tests move the
/// cache clock together with every timer in the controller.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
  anchor_ms: i64,
  anchor: Instant,
}

impl WallClock {
  pub fn new() -> Self {
    Self {
      anchor_ms: chrono::Utc::now().timestamp_millis(),
      anchor: Instant::now(),
    }
  }

  pub fn now_ms(&self) -> i64 {
    self.anchor_ms + self.anchor.elapsed().as_millis() as i64
  }
}

impl Default for WallClock {
  fn default() -> Self {
    Self::new()
  }
}

fn timestamp_key(key: &str) -> String {
  format!("{}_timestamp", key)
}

/// Cache for secondary data that must never be a correctness dependency.
///
/// Every failure path degrades to a miss (on read) or a dropped write.
#[derive(Clone)]
pub struct TtlCache {
  store: Arc<dyn SessionStore>,
  clock: WallClock,
}

impl TtlCache {
  pub fn new(store: Arc<dyn SessionStore>) -> Self {
    Self {
      store,
      clock: WallClock::new(),
    }
  }

  /// Read a value no older than `max_age`.
  pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
    let (payload, written_at) = match self.read_raw(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(SyncError::CacheCorruption { .. }) => {
        self.heal(key);
        return None;
      }
      Err(e) => {
        warn!(key, error = %e, "session store read failed");
        return None;
      }
    };

    let written_at = match written_at.parse::<i64>() {
      Ok(ts) => ts,
      Err(_) => {
        self.heal(key);
        return None;
      }
    };

    let age_ms = self.clock.now_ms().saturating_sub(written_at).max(0) as u128;
    if age_ms >= max_age.as_millis() {
      debug!(key, age_ms = age_ms as u64, "cache entry expired");
      self.evict(key);
      return None;
    }

    match serde_json::from_str::<T>(&payload) {
      Ok(value) => Some(value),
      Err(_) => {
        self.heal(key);
        None
      }
    }
  }

  /// Store a value stamped with the current time.
  ///
  /// A quota failure evicts the key and retries once; a second failure
  /// drops the write.
  pub fn put<T: Serialize>(&self, key: &str, value: &T) {
    let payload = match serde_json::to_string(value) {
      Ok(payload) => payload,
      Err(e) => {
        debug!(key, error = %e, "value not serializable, skipping cache write");
        return;
      }
    };

    match self.write_raw(key, &payload) {
      Ok(()) => {}
      Err(SyncError::QuotaExceeded { .. }) => {
        self.evict(key);
        if let Err(e) = self.write_raw(key, &payload) {
          debug!(key, error = %e, "cache write dropped after retry");
          self.evict(key);
        }
      }
      Err(e) => {
        warn!(key, error = %e, "cache write dropped");
        self.evict(key);
      }
    }
  }

  fn read_raw(&self, key: &str) -> Result<Option<(String, String)>, SyncError> {
    let payload = self.store.get_item(key)?;
    let written_at = self.store.get_item(&timestamp_key(key))?;

    match (payload, written_at) {
      (Some(payload), Some(written_at)) => Ok(Some((payload, written_at))),
      (None, None) => Ok(None),
      // Half an entry is as good as a corrupt one
      _ => Err(SyncError::CacheCorruption {
        key: key.to_string(),
      }),
    }
  }

  fn write_raw(&self, key: &str, payload: &str) -> Result<(), SyncError> {
    self.store.set_item(key, payload)?;
    self
      .store
      .set_item(&timestamp_key(key), &self.clock.now_ms().to_string())
  }

  fn heal(&self, key: &str) {
    let err = SyncError::CacheCorruption {
      key: key.to_string(),
    };
    debug!(key, "{}, evicting", err);
    self.evict(key);
  }

  fn evict(&self, key: &str) {
    for item in [key.to_string(), timestamp_key(key)] {
      if let Err(e) = self.store.remove_item(&item) {
        warn!(key = %item, error = %e, "failed to evict cache entry");
      }
    }
  }
}
