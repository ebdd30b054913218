//! Single-pass bucketing of records by status, with summary statistics.

use super::category::{Category, PerCategory};
use crate::api::{RequestRecord, RequestStatus};

/// Summary numbers shown above the buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
  pub total_count: usize,
  pub pending_count: usize,
  pub completed_count: usize,
  /// Mean created-to-updated time of completed requests, 1 decimal
  pub average_resolution_hours: f64,
}

impl Stats {
  fn new(buckets: &PerCategory<Vec<RequestRecord>>, samples: &ResolutionSamples) -> Self {
    let total_count = buckets.values().map(Vec::len).sum();
    let completed_count = buckets[Category::Completed].len();

    Self {
      total_count,
      pending_count: total_count - completed_count,
      completed_count,
      average_resolution_hours: samples.mean_rounded(),
    }
  }

  /// Stats over buckets that are already split.
  pub fn from_buckets(buckets: &PerCategory<Vec<RequestRecord>>) -> Self {
    let mut samples = ResolutionSamples::default();
    for record in &buckets[Category::Completed] {
      samples.observe(record);
    }
    Self::new(buckets, &samples)
  }
}

#[derive(Debug, Default)]
struct ResolutionSamples {
  sum_hours: f64,
  count: usize,
}

impl ResolutionSamples {
  fn observe(&mut self, record: &RequestRecord) {
    if record.status != RequestStatus::Completed {
      return;
    }
    if let (Some(created), Some(updated)) = (record.created_at, record.updated_at) {
      // Skip clock skew and bad data
      if updated > created {
        self.sum_hours += (updated - created).num_milliseconds() as f64 / 3_600_000.0;
        self.count += 1;
      }
    }
  }

  fn mean_rounded(&self) -> f64 {
    if self.count == 0 {
      return 0.0;
    }
    let mean = self.sum_hours / self.count as f64;
    (mean * 10.0).round() / 10.0
  }
}

/// Records split into buckets plus their stats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
  pub buckets: PerCategory<Vec<RequestRecord>>,
  pub stats: Stats,
}

/// Bucket records by status in one pass, keeping input order.
///
/// Records with a status outside the known set are dropped.
pub fn classify(records: impl IntoIterator<Item = RequestRecord>) -> Classification {
  let mut buckets: PerCategory<Vec<RequestRecord>> = PerCategory::default();
  let mut samples = ResolutionSamples::default();

  for record in records {
    let Some(category) = Category::for_status(record.status) else {
      continue;
    };
    samples.observe(&record);
    buckets[category].push(record);
  }

  let stats = Stats::new(&buckets, &samples);
  Classification { buckets, stats }
}
