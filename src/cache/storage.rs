//! Session-scoped key/value storage backed by SQLite.

use rusqlite::{params, Connection, OptionalExtension};
#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

/// String key/value store scoped to one session.
///
/// Writes may fail with `SyncError::QuotaExceeded`; callers that only use
/// the store as an optimization are expected to recover from that.
pub trait SessionStore: Send + Sync {
  fn get_item(&self, key: &str) -> SyncResult<Option<String>>;

  fn set_item(&self, key: &str, value: &str) -> SyncResult<()>;

  fn remove_item(&self, key: &str) -> SyncResult<()>;
}

fn entry_size(key: &str, value: &str) -> u64 {
  (key.len() + value.len()) as u64
}

/// In-memory store for tests, with an optional quota.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  items: Mutex<HashMap<String, String>>,
  max_bytes: Option<u64>,
}

#[cfg(test)]
impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Limit the total size of keys and values.
  ///
  /// Headroom is checked before an existing value under the same key is
  /// released, so replacing a large entry can fail until it is removed.
  pub fn with_quota(max_bytes: u64) -> Self {
    Self {
      items: Mutex::default(),
      max_bytes: Some(max_bytes),
    }
  }

  fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
    self
      .items
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))
  }
}

#[cfg(test)]
impl SessionStore for MemoryStore {
  fn get_item(&self, key: &str) -> SyncResult<Option<String>> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> SyncResult<()> {
    let mut items = self.lock()?;

    if let Some(max_bytes) = self.max_bytes {
      let used: u64 = items.iter().map(|(k, v)| entry_size(k, v)).sum();
      if used + entry_size(key, value) > max_bytes {
        return Err(SyncError::QuotaExceeded {
          key: key.to_string(),
        });
      }
    }

    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> SyncResult<()> {
    self.lock()?.remove(key);
    Ok(())
  }
}

/// SQLite-backed session store.
pub struct SqliteSessionStore {
  conn: Mutex<Connection>,
  max_bytes: Option<u64>,
}

/// Schema for the session table.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_store (
    item_key TEXT PRIMARY KEY,
    item_value TEXT NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSessionStore {
  /// Open (or create) a store backed by the file at `path`.
  pub fn open(path: &Path, max_bytes: Option<u64>) -> SyncResult<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| SyncError::Storage(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SyncError::Storage(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn, max_bytes)
  }

  /// A store that lives only as long as this process.
  pub fn in_memory(max_bytes: Option<u64>) -> SyncResult<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| SyncError::Storage(format!("Failed to open in-memory database: {}", e)))?;
    Self::with_connection(conn, max_bytes)
  }

  fn with_connection(conn: Connection, max_bytes: Option<u64>) -> SyncResult<Self> {
    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| SyncError::Storage(format!("Failed to run cache migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
      max_bytes,
    })
  }

  fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl SessionStore for SqliteSessionStore {
  fn get_item(&self, key: &str) -> SyncResult<Option<String>> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT item_value FROM session_store WHERE item_key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| SyncError::Storage(format!("Failed to read {}: {}", key, e)))
  }

  fn set_item(&self, key: &str, value: &str) -> SyncResult<()> {
    let conn = self.lock()?;

    if let Some(max_bytes) = self.max_bytes {
      let used: i64 = conn
        .query_row(
          "SELECT COALESCE(SUM(LENGTH(item_key) + LENGTH(item_value)), 0) FROM session_store",
          [],
          |row| row.get(0),
        )
        .map_err(|e| SyncError::Storage(format!("Failed to measure store: {}", e)))?;

      if used.max(0) as u64 + entry_size(key, value) > max_bytes {
        return Err(SyncError::QuotaExceeded {
          key: key.to_string(),
        });
      }
    }

    conn
      .execute(
        "INSERT OR REPLACE INTO session_store (item_key, item_value, written_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| SyncError::Storage(format!("Failed to write {}: {}", key, e)))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> SyncResult<()> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM session_store WHERE item_key = ?", params![key])
      .map_err(|e| SyncError::Storage(format!("Failed to remove {}: {}", key, e)))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_round_trip() {
    let store = SqliteSessionStore::in_memory(None).unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);

    store.set_item("k", "v1").unwrap();
    store.set_item("k", "v2").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v2"));

    store.remove_item("k").unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);
  }

  #[test]
  fn test_sqlite_quota() {
    let store = SqliteSessionStore::in_memory(Some(10)).unwrap();
    store.set_item("ab", "cdef").unwrap();

    let err = store.set_item("gh", "ijklmn").unwrap_err();
    assert!(matches!(err, SyncError::QuotaExceeded { key } if key == "gh"));

    store.remove_item("ab").unwrap();
    store.set_item("gh", "ijklmn").unwrap();
  }

  #[test]
  fn test_memory_quota_counts_existing_value() {
    let store = MemoryStore::with_quota(8);
    store.set_item("k", "1234").unwrap();

    // 5 bytes in use, the replacement needs 5 more
    assert!(store.set_item("k", "5678").is_err());
    store.remove_item("k").unwrap();
    store.set_item("k", "5678").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("5678"));
  }

  #[test]
  fn test_sqlite_open_creates_parent_dirs() {
    let dir = std::env::temp_dir().join(format!("queue-sync-test-{}", std::process::id()));
    let path = dir.join("nested").join("session.db");

    let store = SqliteSessionStore::open(&path, None).unwrap();
    store.set_item("k", "v").unwrap();
    assert!(path.exists());

    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
  }
}
