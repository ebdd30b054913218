use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  /// Identity the queue is fetched for and mutations are made as
  pub user_id: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

/// How a full refresh issues its per-category requests.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
  /// All categories at once, each outcome handled on its own
  #[default]
  Concurrent,
  /// Fixed order with a pause between requests to bound backend load
  Ordered,
}

/// Timing knobs for the sync controller. All values are milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
  pub throttle_ms: u64,
  pub stale_after_ms: u64,
  pub initial_delay_ms: u64,
  pub poll_interval_ms: u64,
  pub visibility_debounce_ms: u64,
  pub strategy: StrategyKind,
  /// Pause between requests when `strategy` is `ordered`
  pub request_delay_ms: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      throttle_ms: 5_000,
      stale_after_ms: 300_000,
      initial_delay_ms: 2_000,
      poll_interval_ms: 120_000,
      visibility_debounce_ms: 3_000,
      strategy: StrategyKind::Concurrent,
      request_delay_ms: 1_000,
    }
  }
}

impl SyncConfig {
  pub fn throttle(&self) -> Duration {
    Duration::from_millis(self.throttle_ms)
  }

  pub fn stale_after(&self) -> Duration {
    Duration::from_millis(self.stale_after_ms)
  }

  pub fn initial_delay(&self) -> Duration {
    Duration::from_millis(self.initial_delay_ms)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn visibility_debounce(&self) -> Duration {
    Duration::from_millis(self.visibility_debounce_ms)
  }

  pub fn request_delay(&self) -> Duration {
    Duration::from_millis(self.request_delay_ms)
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
  /// SQLite file for the session store; in-memory when unset
  pub path: Option<PathBuf>,
  /// Soft quota on stored bytes; writes past it fail with a quota error
  pub max_bytes: Option<u64>,
  pub reference_max_age_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      max_bytes: None,
      reference_max_age_secs: 600,
    }
  }
}

impl CacheConfig {
  pub fn reference_max_age(&self) -> Duration {
    Duration::from_secs(self.reference_max_age_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./queue-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/queue-sync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/queue-sync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("queue-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("queue-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.sync.poll_interval_ms == 0 {
      return Err(eyre!("sync.poll_interval_ms must be greater than zero"));
    }

    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks QUEUE_SYNC_TOKEN. A missing token is allowed for services
  /// that sit behind another auth layer.
  pub fn get_api_token() -> Option<String> {
    std::env::var("QUEUE_SYNC_TOKEN").ok().filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse(
      r#"
api:
  url: https://portal.example.com/api
  user_id: u-17
"#,
    )
    .unwrap();

    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.sync, SyncConfig::default());
    assert_eq!(config.sync.throttle(), Duration::from_secs(5));
    assert_eq!(config.sync.stale_after(), Duration::from_secs(300));
    assert_eq!(config.cache.reference_max_age(), Duration::from_secs(600));
  }

  #[test]
  fn test_overrides_sync_section() {
    let config = Config::parse(
      r#"
api:
  url: http://localhost:8080
  user_id: u-1
sync:
  throttle_ms: 3000
  strategy: ordered
cache:
  max_bytes: 4096
"#,
    )
    .unwrap();

    assert_eq!(config.sync.throttle_ms, 3_000);
    assert_eq!(config.sync.strategy, StrategyKind::Ordered);
    assert_eq!(config.sync.poll_interval_ms, 120_000);
    assert_eq!(config.cache.max_bytes, Some(4096));
  }

  #[test]
  fn test_rejects_zero_poll_interval() {
    let result = Config::parse(
      r#"
api:
  url: http://localhost
  user_id: u-1
sync:
  poll_interval_ms: 0
"#,
    );
    assert!(result.is_err());
  }
}
