//! Per-operation latency samples in the score store, reported as
//! percentiles on `/metrics`.

use foresight_protocol::LatencyPercentiles;
use foresight_ranking::{Keys, ScoreStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Rolling sample count per operation.
const MAX_SAMPLES: usize = 1_000;
const SAMPLE_TTL: Duration = Duration::from_secs(3_600);

pub struct LatencyTracker {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
}

impl LatencyTracker {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    pub fn record(&self, operation: &str, elapsed_ms: f64, now_ms: u64) {
        let key = self.keys.latency(operation);
        // Member carries the timestamp for uniqueness; score is the
        // latency so percentile reads are a sorted range.
        let member = format!("{now_ms}:{elapsed_ms:.3}");
        self.store.zadd(&key, &member, elapsed_ms);
        self.store.ztrim_top(&key, MAX_SAMPLES);
        self.store.expire(&key, SAMPLE_TTL);
    }

    #[must_use]
    pub fn percentiles(&self, operation: &str) -> Option<LatencyPercentiles> {
        let key = self.keys.latency(operation);
        let mut values: Vec<f64> = self
            .store
            .zrange_desc(&key, usize::MAX)
            .into_iter()
            .map(|(_, score)| score)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let at = |fraction: f64| {
            let index = ((values.len() as f64 * fraction) as usize).min(values.len() - 1);
            values[index]
        };
        Some(LatencyPercentiles {
            count: values.len() as u64,
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
        })
    }

    /// Every tracked operation with its percentiles.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, LatencyPercentiles> {
        let prefix = self.keys.latency_prefix();
        let mut out = BTreeMap::new();
        for key in self.store.keys_with_prefix(&prefix) {
            let operation = key[prefix.len()..].to_string();
            if let Some(percentiles) = self.percentiles(&operation) {
                out.insert(operation, percentiles);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_ranking::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn percentiles_track_the_distribution() {
        let tracker = LatencyTracker::new(Arc::new(MemoryStore::new()), Keys::new("test"));
        for i in 1..=100u32 {
            tracker.record("symbol", f64::from(i), 1_000 + u64::from(i));
        }
        let p = tracker.percentiles("symbol").unwrap();
        assert_eq!(p.count, 100);
        assert!(p.p50 >= 45.0 && p.p50 <= 55.0, "p50 = {}", p.p50);
        assert!(p.p95 >= 90.0, "p95 = {}", p.p95);
        assert!(p.p99 >= p.p95);
    }

    #[test]
    fn operations_are_listed_separately() {
        let tracker = LatencyTracker::new(Arc::new(MemoryStore::new()), Keys::new("test"));
        tracker.record("symbol", 2.0, 1_000);
        tracker.record("predict", 9.0, 1_001);
        let all = tracker.all();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("symbol"));
        assert!(all.contains_key("predict"));
    }
}
