// In-memory per-volume capacity history with age-based trimming.
// Trimming runs on every merge; there is no background sweep.

mod blob;
pub mod record_store;

pub use record_store::{RecordFormat, RecordStore};

use crate::models::{SizeSample, VolumeRecords};
use std::time::Duration;

/// Per-volume sample histories for one volume class.
///
/// Owned and mutated by a single poller; everyone else gets owned snapshots.
/// Memory is bounded by `(retention / poll interval) × volume count`.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    series: VolumeRecords,
    retention: Duration,
}

impl TimeSeriesStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            series: VolumeRecords::new(),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Takes effect on the next merge.
    pub fn set_retention(&mut self, retention: Duration) {
        self.retention = retention;
    }

    /// Merge a batch into the store and return the resulting snapshot.
    ///
    /// Per key the result is the union of stored and incoming samples, deduplicated
    /// by exact timestamp (the incoming sample wins) and trimmed against `now`.
    /// Keys missing from `incoming` keep their (trimmed) history; a key whose history
    /// trims to nothing is dropped.
    pub fn merge(&mut self, incoming: VolumeRecords, now: f64) -> VolumeRecords {
        for (key, samples) in incoming {
            let existing = self.series.remove(&key).unwrap_or_default();
            self.series.insert(key, union_dedup(samples, existing));
        }
        for samples in self.series.values_mut() {
            *samples = trim(std::mem::take(samples), now, self.retention);
        }
        self.series.retain(|_, samples| !samples.is_empty());
        self.series.clone()
    }

    /// Merge previously persisted records, e.g. at startup.
    pub fn restore(&mut self, records: VolumeRecords, now: f64) -> VolumeRecords {
        self.merge(records, now)
    }

    pub fn series(&self, key: &str) -> Option<&[SizeSample]> {
        self.series.get(key).map(Vec::as_slice)
    }

    pub fn last_sample(&self, key: &str) -> Option<&SizeSample> {
        self.series.get(key).and_then(|s| s.last())
    }

    /// Number of volume keys with retained samples.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

/// Incoming first so a stable sort + dedup keeps the incoming sample on a tie.
fn union_dedup(incoming: Vec<SizeSample>, existing: Vec<SizeSample>) -> Vec<SizeSample> {
    let mut all = incoming;
    all.extend(existing);
    all.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    all.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
    all
}

/// Drop samples older than `now - retention`; the result is ascending by timestamp.
pub fn trim(samples: Vec<SizeSample>, now: f64, retention: Duration) -> Vec<SizeSample> {
    let cutoff = now - retention.as_secs_f64();
    let mut kept: Vec<SizeSample> = samples
        .into_iter()
        .filter(|s| s.timestamp >= cutoff)
        .collect();
    kept.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    kept
}

pub fn oldest_timestamp(records: &VolumeRecords) -> Option<f64> {
    records
        .values()
        .flat_map(|s| s.iter().map(|x| x.timestamp))
        .min_by(f64::total_cmp)
}

pub fn newest_timestamp(records: &VolumeRecords) -> Option<f64> {
    records
        .values()
        .flat_map(|s| s.iter().map(|x| x.timestamp))
        .max_by(f64::total_cmp)
}

/// Seconds covered from the oldest to the newest retained sample across all volumes.
pub fn data_span(records: &VolumeRecords) -> f64 {
    match (oldest_timestamp(records), newest_timestamp(records)) {
        (Some(oldest), Some(newest)) => newest - oldest,
        _ => 0.0,
    }
}
