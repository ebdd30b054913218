//! Error taxonomy of the sync core.

use crate::sync::Category;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// A category fetch was rejected by the service.
  #[error("failed to fetch {category} requests: {message}")]
  Request { category: Category, message: String },

  /// A newer fetch for the same category took over.
  #[error("fetch superseded by a newer one")]
  Cancelled,

  /// A cached payload could not be parsed.
  #[error("cached entry {key} is corrupt")]
  CacheCorruption { key: String },

  /// The session store refused a write.
  #[error("session store quota exceeded while writing {key}")]
  QuotaExceeded { key: String },

  /// A claim, status, comment or data update was rejected.
  #[error("Could not {action}: {message}")]
  Mutation {
    action: &'static str,
    message: String,
  },

  /// The session store failed for any other reason.
  #[error("session store error: {0}")]
  Storage(String),
}

impl SyncError {
  pub fn request(category: Category, source: &color_eyre::Report) -> Self {
    SyncError::Request {
      category,
      message: format!("{:#}", source),
    }
  }

  pub fn mutation(action: &'static str, source: &color_eyre::Report) -> Self {
    SyncError::Mutation {
      action,
      message: source.to_string(),
    }
  }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
