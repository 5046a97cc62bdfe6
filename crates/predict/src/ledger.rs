//! Prediction records and the hit/miss feedback loop.
//!
//! Every prediction is logged with its session, fingerprint, chosen arm,
//! and candidate list; it resolves exactly once, either as a hit when a
//! read in the same session names a candidate, or as a miss when the
//! finalization sweep catches it past the window.

use foresight_ranking::{Keys, ScoreStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Predictions unresolved after this long become misses.
pub const FINALIZE_WINDOW_SECS: u64 = 300;

/// Extra slack before the sweep finalizes, so a late read can still land.
pub const FINALIZE_GRACE_SECS: u64 = 60;

pub const ROLLING_WINDOW_HOURS: u64 = 24;
pub const HIT_AT_K: usize = 5;

const TREND_DEAD_BAND: f64 = 0.05;
const MIN_TREND_SAMPLES: u64 = 5;

/// Records outlive the rolling window slightly so stats never read a
/// half-expired tail.
const RECORD_TTL: Duration = Duration::from_secs(ROLLING_WINDOW_HOURS * 3_600 + 1_800);

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: String,
    pub session: String,
    pub fingerprint: String,
    pub arm: usize,
    pub candidates: Vec<String>,
    pub created_at_ms: u64,
    pub resolved: bool,
    pub hit: bool,
    pub hit_rank: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Copy)]
pub struct RollingWindowStats {
    pub window_hours: u64,
    pub total: u64,
    pub evaluated: u64,
    pub pending: u64,
    pub hits: u64,
    pub hit_at_k: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeCounters {
    pub hits: u64,
    pub misses: u64,
}

impl CumulativeCounters {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct PredictionLedger {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
    sequence: AtomicU64,
}

impl PredictionLedger {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self {
            store,
            keys,
            sequence: AtomicU64::new(0),
        }
    }

    /// Log a prediction; the returned id sorts chronologically.
    pub fn log_prediction(
        &self,
        session: &str,
        fingerprint: &str,
        arm: usize,
        candidates: &[String],
        now_ms: u64,
    ) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!("{session}:{now_ms}:{seq}");

        let key = self.keys.prediction(&id);
        self.store.hset(&key, "session", session);
        self.store.hset(&key, "fingerprint", fingerprint);
        self.store.hset(&key, "arm", &arm.to_string());
        self.store.hset(
            &key,
            "candidates",
            &serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string()),
        );
        self.store.hset(&key, "created_at", &now_ms.to_string());
        self.store.hset(&key, "resolved", "0");
        self.store.hset(&key, "hit", "0");
        self.store.expire(&key, RECORD_TTL);

        self.store
            .zadd(&self.keys.rolling_predictions(), &id, now_ms as f64);
        id
    }

    #[must_use]
    pub fn read_record(&self, id: &str) -> Option<PredictionRecord> {
        let fields = self.store.hgetall(&self.keys.prediction(id));
        if fields.is_empty() {
            return None;
        }
        Some(PredictionRecord {
            id: id.to_string(),
            session: fields.get("session").cloned().unwrap_or_default(),
            fingerprint: fields.get("fingerprint").cloned().unwrap_or_default(),
            arm: fields.get("arm").and_then(|v| v.parse().ok()).unwrap_or(0),
            candidates: fields
                .get("candidates")
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            created_at_ms: fields
                .get("created_at")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            resolved: fields.get("resolved").map(String::as_str) == Some("1"),
            hit: fields.get("hit").map(String::as_str) == Some("1"),
            hit_rank: fields.get("hit_rank").and_then(|v| v.parse().ok()),
        })
    }

    /// Resolve every unresolved prediction in `session` that names `path`
    /// as a hit. Returns the arms to reward, one per resolved record.
    pub fn resolve_on_access(&self, session: &str, path: &str, now_ms: u64) -> Vec<usize> {
        let horizon_ms = (FINALIZE_WINDOW_SECS + FINALIZE_GRACE_SECS) * 1_000;
        let mut rewarded = Vec::new();

        for (id, _) in self
            .store
            .zrange_desc(&self.keys.rolling_predictions(), usize::MAX)
        {
            let Some(record) = self.read_record(&id) else {
                continue;
            };
            if record.resolved
                || record.session != session
                || record.created_at_ms > now_ms
                || now_ms - record.created_at_ms > horizon_ms
            {
                continue;
            }
            let Some(rank) = record.candidates.iter().position(|c| c == path) else {
                continue;
            };

            let key = self.keys.prediction(&id);
            self.store.hset(&key, "resolved", "1");
            self.store.hset(&key, "hit", "1");
            self.store.hset(&key, "hit_rank", &rank.to_string());
            self.store.hincrby(&self.keys.counters(), "hits", 1);
            rewarded.push(record.arm);
        }
        rewarded
    }

    /// Sweep predictions past the window (plus grace) into misses.
    /// Returns the arms to penalize.
    pub fn finalize_stale(&self, now_ms: u64, window_secs: u64, grace_secs: u64) -> Vec<usize> {
        let cutoff_ms = (window_secs + grace_secs) * 1_000;
        let mut penalized = Vec::new();

        for (id, _) in self
            .store
            .zrange_desc(&self.keys.rolling_predictions(), usize::MAX)
        {
            let Some(record) = self.read_record(&id) else {
                continue;
            };
            if record.resolved || now_ms.saturating_sub(record.created_at_ms) <= cutoff_ms {
                continue;
            }

            let key = self.keys.prediction(&id);
            self.store.hset(&key, "resolved", "1");
            self.store.hset(&key, "hit", "0");
            self.store.hincrby(&self.keys.counters(), "misses", 1);
            penalized.push(record.arm);
        }
        penalized
    }

    /// Drop rolling-window entries past the window; the record hashes
    /// expire on their own TTL.
    pub fn prune(&self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(ROLLING_WINDOW_HOURS * 3_600 * 1_000) as f64;
        let key = self.keys.rolling_predictions();
        let mut removed = 0;
        for (id, score) in self.store.zrange_desc(&key, usize::MAX) {
            if score < cutoff {
                self.store.zrem(&key, &id);
                removed += 1;
            }
        }
        removed
    }

    #[must_use]
    pub fn cumulative(&self) -> CumulativeCounters {
        let counters = self.store.hgetall(&self.keys.counters());
        let get = |field: &str| {
            counters
                .get(field)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };
        CumulativeCounters {
            hits: get("hits"),
            misses: get("misses"),
        }
    }

    /// Rolling-window accounting over resolved predictions only.
    #[must_use]
    pub fn rolling_stats(&self, now_ms: u64) -> RollingWindowStats {
        let window_ms = ROLLING_WINDOW_HOURS * 3_600 * 1_000;
        let cutoff = now_ms.saturating_sub(window_ms);
        let half = now_ms.saturating_sub(window_ms / 2);

        let mut total = 0u64;
        let mut evaluated = 0u64;
        let mut hits = 0u64;
        let mut hits_at_k = 0u64;
        let mut recent = (0u64, 0u64); // (evaluated, hits) in the newer half
        let mut prior = (0u64, 0u64);

        for (id, score) in self
            .store
            .zrange_desc(&self.keys.rolling_predictions(), usize::MAX)
        {
            if (score as u64) < cutoff {
                continue;
            }
            let Some(record) = self.read_record(&id) else {
                continue;
            };
            total += 1;
            if !record.resolved {
                continue;
            }
            evaluated += 1;
            let bucket = if record.created_at_ms >= half {
                &mut recent
            } else {
                &mut prior
            };
            bucket.0 += 1;
            if record.hit {
                hits += 1;
                bucket.1 += 1;
                if record.hit_rank.is_some_and(|rank| rank < HIT_AT_K) {
                    hits_at_k += 1;
                }
            }
        }

        let hit_at_k = if evaluated == 0 {
            0.0
        } else {
            hits_at_k as f64 / evaluated as f64
        };

        let trend = if recent.0 < MIN_TREND_SAMPLES || prior.0 < MIN_TREND_SAMPLES {
            TrendDirection::InsufficientData
        } else {
            let recent_rate = recent.1 as f64 / recent.0 as f64;
            let prior_rate = prior.1 as f64 / prior.0 as f64;
            if recent_rate > prior_rate + TREND_DEAD_BAND {
                TrendDirection::Improving
            } else if recent_rate < prior_rate - TREND_DEAD_BAND {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            }
        };

        RollingWindowStats {
            window_hours: ROLLING_WINDOW_HOURS,
            total,
            evaluated,
            pending: total - evaluated,
            hits,
            hit_at_k,
            trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_ranking::MemoryStore;
    use pretty_assertions::assert_eq;

    fn ledger() -> PredictionLedger {
        PredictionLedger::new(Arc::new(MemoryStore::new()), Keys::new("test"))
    }

    fn candidates(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn matching_read_resolves_as_hit_with_rank() {
        let l = ledger();
        let id = l.log_prediction("s1", "fp", 2, &candidates(&["/a.py", "/b.py"]), 1_000);

        let arms = l.resolve_on_access("s1", "/b.py", 2_000);
        assert_eq!(arms, vec![2]);

        let record = l.read_record(&id).unwrap();
        assert!(record.resolved);
        assert!(record.hit);
        assert_eq!(record.hit_rank, Some(1));
        assert_eq!(l.cumulative().hits, 1);
    }

    #[test]
    fn resolution_happens_exactly_once() {
        let l = ledger();
        l.log_prediction("s1", "fp", 0, &candidates(&["/a.py"]), 1_000);

        assert_eq!(l.resolve_on_access("s1", "/a.py", 2_000).len(), 1);
        assert_eq!(l.resolve_on_access("s1", "/a.py", 3_000).len(), 0);
        assert_eq!(l.cumulative().hits, 1);
    }

    #[test]
    fn other_sessions_do_not_resolve() {
        let l = ledger();
        l.log_prediction("s1", "fp", 0, &candidates(&["/a.py"]), 1_000);
        assert!(l.resolve_on_access("s2", "/a.py", 2_000).is_empty());
    }

    #[test]
    fn reads_before_the_prediction_do_not_resolve() {
        let l = ledger();
        l.log_prediction("s1", "fp", 0, &candidates(&["/a.py"]), 5_000);
        assert!(l.resolve_on_access("s1", "/a.py", 4_000).is_empty());
    }

    #[test]
    fn stale_predictions_finalize_as_miss() {
        let l = ledger();
        l.log_prediction("s1", "fp", 4, &candidates(&["/a.py"]), 1_000);

        // Inside window + grace: nothing finalizes.
        let early = l.finalize_stale(
            1_000 + FINALIZE_WINDOW_SECS * 1_000,
            FINALIZE_WINDOW_SECS,
            FINALIZE_GRACE_SECS,
        );
        assert!(early.is_empty());

        let late = l.finalize_stale(
            2_000 + (FINALIZE_WINDOW_SECS + FINALIZE_GRACE_SECS) * 1_000,
            FINALIZE_WINDOW_SECS,
            FINALIZE_GRACE_SECS,
        );
        assert_eq!(late, vec![4]);
        assert_eq!(l.cumulative().misses, 1);

        // Exactly-once: a second sweep finds nothing.
        let again = l.finalize_stale(
            9_999_000,
            FINALIZE_WINDOW_SECS,
            FINALIZE_GRACE_SECS,
        );
        assert!(again.is_empty());
    }

    #[test]
    fn rolling_stats_count_only_window_records() {
        let l = ledger();
        let now_ms = ROLLING_WINDOW_HOURS * 3_600 * 1_000 * 2;
        let stale_ms = now_ms - ROLLING_WINDOW_HOURS * 3_600 * 1_000 - 1_000;

        l.log_prediction("s1", "fp", 0, &candidates(&["/old.py"]), stale_ms);
        l.log_prediction("s1", "fp", 0, &candidates(&["/a.py"]), now_ms - 10_000);
        l.log_prediction("s1", "fp", 0, &candidates(&["/b.py"]), now_ms - 5_000);
        l.resolve_on_access("s1", "/a.py", now_ms - 9_000);

        let stats = l.rolling_stats(now_ms);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_at_k, 1.0);
        assert_eq!(stats.trend, TrendDirection::InsufficientData);
    }

    #[test]
    fn prune_drops_entries_past_the_window() {
        let l = ledger();
        let now_ms = ROLLING_WINDOW_HOURS * 3_600 * 1_000 * 2;
        l.log_prediction("s1", "fp", 0, &candidates(&["/old.py"]), 1_000);
        l.log_prediction("s1", "fp", 0, &candidates(&["/new.py"]), now_ms - 1_000);

        assert_eq!(l.prune(now_ms), 1);
        assert_eq!(l.rolling_stats(now_ms).total, 1);
    }
}
