use std::time::Duration;
use tokio::time::Instant;

use super::categorizer::Stats;
use super::category::{Category, PerCategory};
use crate::api::RequestRecord;

/// Default age after which a category is considered stale
pub const STALE_AFTER: Duration = Duration::from_millis(300_000);

/// Current records per category and when each was last written.
#[derive(Debug, Clone)]
pub struct CategorizedStore {
  buckets: PerCategory<Vec<RequestRecord>>,
  last_updated: PerCategory<Option<Instant>>,
  stale_after: Duration,
}

impl CategorizedStore {
  pub fn new(stale_after: Duration) -> Self {
    Self {
      buckets: PerCategory::default(),
      last_updated: PerCategory::default(),
      stale_after,
    }
  }

  /// Replace a bucket. The only way records enter the store.
  pub fn set_category(&mut self, category: Category, records: Vec<RequestRecord>, now: Instant) {
    self.buckets[category] = records;
    self.last_updated[category] = Some(now);
  }

  /// True once the bucket is older than the stale threshold, or was never written.
  pub fn is_stale(&self, category: Category, now: Instant) -> bool {
    match self.last_updated[category] {
      Some(written) => now.saturating_duration_since(written) > self.stale_after,
      None => true,
    }
  }

  #[cfg(test)]
  pub fn records(&self, category: Category) -> &[RequestRecord] {
    &self.buckets[category]
  }

  pub fn buckets(&self) -> &PerCategory<Vec<RequestRecord>> {
    &self.buckets
  }

  #[cfg(test)]
  pub fn last_updated(&self, category: Category) -> Option<Instant> {
    self.last_updated[category]
  }

  pub fn stats(&self) -> Stats {
    Stats::from_buckets(&self.buckets)
  }

  /// Find a record and the bucket holding it.
  #[cfg(test)]
  pub fn find(&self, id: u64) -> Option<(Category, &RequestRecord)> {
    self
      .buckets
      .iter()
      .find_map(|(category, records)| records.iter().find(|r| r.id == id).map(|r| (category, r)))
  }
}

impl Default for CategorizedStore {
  fn default() -> Self {
    Self::new(STALE_AFTER)
  }
}
