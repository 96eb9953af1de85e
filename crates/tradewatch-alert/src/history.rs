use crate::shard::ShardedMap;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

type HistoryKey = (String, String);

/// Bounded per-`(service, metric)` ring of timestamped values.
///
/// Appends are O(1) amortized and never touch I/O; the oldest samples are
/// dropped silently once a key reaches capacity. This is the bounded-memory
/// policy, not an error condition; duration checks only ever need the
/// recent window.
pub struct MetricHistory {
    capacity: usize,
    series: ShardedMap<HistoryKey, VecDeque<(DateTime<Utc>, f64)>>,
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: ShardedMap::new(),
        }
    }

    pub fn append(&self, service: &str, metric: &str, value: f64, timestamp: DateTime<Utc>) {
        let key = (service.to_string(), metric.to_string());
        let capacity = self.capacity;
        self.series.update(
            key,
            || VecDeque::with_capacity(capacity.min(16)),
            |ring| {
                ring.push_back((timestamp, value));
                while ring.len() > capacity {
                    ring.pop_front();
                }
            },
        );
    }

    /// Samples with `timestamp >= since`, oldest first. Empty if the key
    /// has never been observed.
    pub fn window(
        &self,
        service: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, f64)> {
        let key = (service.to_string(), metric.to_string());
        self.series
            .read_with(&key, |ring| {
                ring.iter()
                    .filter(|(ts, _)| *ts >= since)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent sample for a key, if any.
    pub fn latest(&self, service: &str, metric: &str) -> Option<(DateTime<Utc>, f64)> {
        let key = (service.to_string(), metric.to_string());
        self.series
            .read_with(&key, |ring| ring.back().copied())
            .flatten()
    }

    /// Number of samples currently retained for a key.
    pub fn len(&self, service: &str, metric: &str) -> usize {
        let key = (service.to_string(), metric.to_string());
        self.series.read_with(&key, |ring| ring.len()).unwrap_or(0)
    }
}
