//! Markov-style transition learning over session file-access sequences.
//!
//! An access to `B` shortly after `A` strengthens the edge `A -> B`. Edges
//! are stored as string-keyed sorted sets (never object graphs), pruned to
//! the strongest few per source so per-path memory stays bounded.

use crate::keys::Keys;
use crate::store::ScoreStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Accesses further apart than this are unrelated.
pub const TRANSITION_WINDOW_SECS: u64 = 300;

/// An edge must be observed this many times before it predicts anything.
pub const MIN_TRANSITION_COUNT: i64 = 2;

/// Outgoing edges kept per source path.
pub const MAX_TRANSITIONS_PER_FILE: usize = 20;

/// How many recent session entries can feed transitions for one access.
const RECENT_WINDOW: usize = 10;

/// Session sequence bookkeeping.
const SESSION_CAP: usize = 100;
const SESSION_TTL: Duration = Duration::from_secs(24 * 3_600);
const EDGE_TTL: Duration = Duration::from_secs(7 * 24 * 3_600);

/// Per-step weight decay when blending predictions from several recent
/// session accesses.
pub const SESSION_DECAY: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOut {
    pub to: String,
    pub probability: f64,
    pub count: i64,
}

pub struct TransitionTracker {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
}

impl TransitionTracker {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    /// Register a session so its sequence key exists with a TTL.
    pub fn session_start(&self, session: &str, now: u64) {
        let seq_key = self.keys.session_seq(session);
        self.store.zadd(&seq_key, "", now as f64);
        self.store.zrem(&seq_key, "");
        self.store.expire(&seq_key, SESSION_TTL);
        self.store.sadd(&self.keys.sessions(), session);
    }

    /// Record an access into the session sequence and learn transitions
    /// from every recent access inside the window. Returns the number of
    /// edges strengthened.
    pub fn observe_access(&self, session: &str, path: &str, now: u64) -> usize {
        let seq_key = self.keys.session_seq(session);
        let recent = self.store.zrange_desc(&seq_key, RECENT_WINDOW);

        let mut recorded = 0;
        for (prev, ts) in recent {
            if prev == path {
                continue;
            }
            let delta = now as f64 - ts;
            if delta >= 0.0 && delta <= TRANSITION_WINDOW_SECS as f64 {
                self.record_transition(&prev, path);
                recorded += 1;
            }
        }

        self.store.zadd(&seq_key, path, now as f64);
        self.store.ztrim_top(&seq_key, SESSION_CAP);
        self.store.expire(&seq_key, SESSION_TTL);
        self.store.sadd(&self.keys.sessions(), session);
        recorded
    }

    fn record_transition(&self, from: &str, to: &str) {
        let count_key = self.keys.transition_counts(from);
        self.store.hincrby(&count_key, to, 1);
        self.store.expire(&count_key, EDGE_TTL);
        self.rebuild_probabilities(from);
    }

    /// Recompute P(to | from) for every target of `from` and swap the
    /// sorted set in one step so readers never see a half-built edge list.
    fn rebuild_probabilities(&self, from: &str) {
        let counts = self.store.hgetall(&self.keys.transition_counts(from));
        if counts.is_empty() {
            return;
        }
        let parsed: HashMap<String, i64> = counts
            .into_iter()
            .filter_map(|(to, raw)| raw.parse::<i64>().ok().map(|c| (to, c)))
            .collect();
        let total: i64 = parsed.values().sum();
        if total <= 0 {
            return;
        }

        let mut entries: Vec<(String, f64)> = parsed
            .into_iter()
            .filter(|(_, count)| *count >= MIN_TRANSITION_COUNT)
            .map(|(to, count)| (to, count as f64 / total as f64))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        entries.truncate(MAX_TRANSITIONS_PER_FILE);

        let trans_key = self.keys.transitions(from);
        self.store.zreplace(&trans_key, entries);
        self.store.expire(&trans_key, EDGE_TTL);
    }

    /// Strongest destinations from a path, probability plus raw count.
    #[must_use]
    pub fn transitions_from(&self, from: &str, limit: usize) -> Vec<TransitionOut> {
        let count_key = self.keys.transition_counts(from);
        self.store
            .zrange_desc(&self.keys.transitions(from), limit)
            .into_iter()
            .map(|(to, probability)| {
                let count = self
                    .store
                    .hget(&count_key, &to)
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                TransitionOut {
                    to,
                    probability,
                    count,
                }
            })
            .collect()
    }

    /// Most recent paths in a session, newest first.
    #[must_use]
    pub fn recent_session_paths(&self, session: &str, limit: usize) -> Vec<(String, f64)> {
        self.store
            .zrange_desc(&self.keys.session_seq(session), limit)
    }

    /// Blend transition predictions from the last few session accesses,
    /// weighting newer anchors higher.
    #[must_use]
    pub fn predict_from_recent(&self, session: &str, limit: usize) -> Vec<(String, f64)> {
        let recent = self.recent_session_paths(session, 5);
        let mut blended: HashMap<String, f64> = HashMap::new();
        for (idx, (path, _)) in recent.iter().enumerate() {
            let weight = SESSION_DECAY.powi(idx as i32);
            for out in self.transitions_from(path, limit) {
                *blended.entry(out.to).or_insert(0.0) += out.probability * weight;
            }
        }
        let mut results: Vec<(String, f64)> = blended.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.store.smembers(&self.keys.sessions()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn tracker() -> TransitionTracker {
        TransitionTracker::new(Arc::new(MemoryStore::new()), Keys::new("test"))
    }

    #[test]
    fn single_observation_stays_below_noise_floor() {
        let t = tracker();
        t.observe_access("s1", "/auth.py", 1_000);
        t.observe_access("s1", "/session.py", 1_010);
        assert!(t.transitions_from("/auth.py", 5).is_empty());
    }

    #[test]
    fn repeated_sequence_becomes_a_high_probability_edge() {
        let t = tracker();
        let mut now = 1_000;
        for _ in 0..10 {
            t.observe_access("s1", "/auth.py", now);
            t.observe_access("s1", "/session.py", now + 5);
            now += 1_000;
        }
        let outs = t.transitions_from("/auth.py", 5);
        assert_eq!(outs[0].to, "/session.py");
        assert!(outs[0].probability > 0.8);
        assert!(outs[0].count >= 9);
    }

    #[test]
    fn accesses_outside_window_do_not_link() {
        let t = tracker();
        t.observe_access("s1", "/a.py", 1_000);
        t.observe_access("s1", "/b.py", 1_000 + TRANSITION_WINDOW_SECS + 1);
        assert!(t
            .store
            .hgetall(&t.keys.transition_counts("/a.py"))
            .is_empty());
    }

    #[test]
    fn self_transitions_are_skipped() {
        let t = tracker();
        t.observe_access("s1", "/a.py", 1_000);
        t.observe_access("s1", "/a.py", 1_005);
        assert!(t
            .store
            .hgetall(&t.keys.transition_counts("/a.py"))
            .is_empty());
    }

    #[test]
    fn sessions_are_isolated_sequences() {
        let t = tracker();
        t.observe_access("s1", "/a.py", 1_000);
        t.observe_access("s2", "/b.py", 1_001);
        // No cross-session transition even though the window matches.
        assert!(t
            .store
            .hgetall(&t.keys.transition_counts("/a.py"))
            .is_empty());
        assert_eq!(t.session_count(), 2);
    }

    #[test]
    fn outgoing_edges_are_capped() {
        let t = tracker();
        let mut now = 1_000;
        for i in 0..30 {
            for _ in 0..2 {
                t.observe_access("s1", "/hub.py", now);
                t.observe_access("s1", &format!("/spoke_{i}.py"), now + 1);
                now += 1_000;
            }
        }
        let outs = t.transitions_from("/hub.py", 100);
        assert!(outs.len() <= MAX_TRANSITIONS_PER_FILE);
    }

    #[test]
    fn recent_blending_prefers_fresh_anchors() {
        let t = tracker();
        let mut now = 1_000;
        for _ in 0..5 {
            t.observe_access("s1", "/a.py", now);
            t.observe_access("s1", "/a_next.py", now + 1);
            now += 1_000;
        }
        for _ in 0..5 {
            t.observe_access("s1", "/b.py", now);
            t.observe_access("s1", "/b_next.py", now + 1);
            now += 1_000;
        }
        let predictions = t.predict_from_recent("s1", 5);
        assert!(!predictions.is_empty());
        let paths: Vec<&str> = predictions.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"/b_next.py"));
    }
}
