//! Composite file scoring from recency, frequency, and tag affinity.
//!
//! Raw scores live in the store in their natural units (epoch seconds,
//! counts). All mixing happens on signals normalized to [0,1] at read
//! time, so timestamp-sized and count-sized numbers never share a sum.

use crate::keys::Keys;
use crate::store::ScoreStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Recency half-life: an access loses half its pull after one hour.
pub const RECENCY_HALF_LIFE_SECS: f64 = 3_600.0;

/// Access count treated as saturation for the frequency signal.
pub const FREQUENCY_CEILING: f64 = 100.0;

const LN_2: f64 = std::f64::consts::LN_2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub recency: f64,
    pub frequency: f64,
    pub tag: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            recency: 0.4,
            frequency: 0.3,
            tag: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedFile {
    pub path: String,
    pub recency: f64,
    pub frequency: f64,
    pub tag: f64,
    pub composite: f64,
}

/// Normalized recency: `exp(-ln2 · age / half_life)`, clamped to [0,1].
#[must_use]
pub fn recency_signal(now: u64, last_access: f64) -> f64 {
    let age = (now as f64 - last_access).max(0.0);
    (-LN_2 * age / RECENCY_HALF_LIFE_SECS).exp().clamp(0.0, 1.0)
}

/// Normalized frequency: `min(1, ln(1+count)/ln(1+ceiling))`.
#[must_use]
pub fn frequency_signal(count: f64) -> f64 {
    if count <= 0.0 {
        return 0.0;
    }
    ((1.0 + count).ln() / (1.0 + FREQUENCY_CEILING).ln()).min(1.0)
}

pub struct Scorer {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
}

impl Scorer {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    #[must_use]
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Record one access: recency to `now`, frequency +1, each tag's
    /// affinity +1, and the tag attached to the path's tag set.
    pub fn record_access(&self, path: &str, tags: &[String], now: u64) {
        self.store.zadd(&self.keys.recency(), path, now as f64);
        self.store.zincrby(&self.keys.frequency(), path, 1.0);
        for tag in tags {
            self.store.zincrby(&self.keys.tag(tag), path, 1.0);
            self.store.sadd(&self.keys.path_tags(path), tag);
        }
    }

    #[must_use]
    pub fn last_access(&self, path: &str) -> Option<f64> {
        self.store.zscore(&self.keys.recency(), path)
    }

    #[must_use]
    pub fn access_count(&self, path: &str) -> f64 {
        self.store.zscore(&self.keys.frequency(), path).unwrap_or(0.0)
    }

    #[must_use]
    pub fn top_by_recency(&self, limit: usize) -> Vec<(String, f64)> {
        self.store.zrange_desc(&self.keys.recency(), limit)
    }

    #[must_use]
    pub fn top_by_tag(&self, tag: &str, limit: usize) -> Vec<(String, f64)> {
        self.store.zrange_desc(&self.keys.tag(tag), limit)
    }

    /// Raw affinity of one path under one tag.
    #[must_use]
    pub fn tag_score(&self, path: &str, tag: &str) -> Option<f64> {
        self.store.zscore(&self.keys.tag(tag), path)
    }

    /// Highest affinity in a tag's set, used to normalize tag signals.
    #[must_use]
    pub fn max_tag_score(&self, tag: &str) -> Option<f64> {
        self.store
            .zrange_desc(&self.keys.tag(tag), 1)
            .first()
            .map(|(_, score)| *score)
    }

    /// Rank every tracked file by the weighted composite of normalized
    /// signals. The tag signal is the per-tag max-normalized affinity
    /// averaged across the supplied tags, zero when none are supplied.
    #[must_use]
    pub fn top_composite(
        &self,
        tags: &[String],
        weights: Weights,
        limit: usize,
        now: u64,
    ) -> Vec<RankedFile> {
        let recency = self.store.zrange_desc(&self.keys.recency(), usize::MAX);
        let frequency = self.store.zrange_desc(&self.keys.frequency(), usize::MAX);

        let mut recency_by_path: HashMap<&str, f64> = HashMap::new();
        for (path, ts) in &recency {
            recency_by_path.insert(path, *ts);
        }
        let mut frequency_by_path: HashMap<&str, f64> = HashMap::new();
        for (path, count) in &frequency {
            frequency_by_path.insert(path, *count);
        }

        // tag -> path -> normalized affinity
        let mut tag_signals: Vec<HashMap<String, f64>> = Vec::with_capacity(tags.len());
        for tag in tags {
            let members = self.store.zrange_desc(&self.keys.tag(tag), usize::MAX);
            let max = members
                .iter()
                .map(|(_, s)| *s)
                .fold(0.0f64, f64::max)
                .max(f64::MIN_POSITIVE);
            tag_signals.push(
                members
                    .into_iter()
                    .map(|(path, score)| (path, score / max))
                    .collect(),
            );
        }

        let mut candidates: Vec<&str> = recency_by_path.keys().copied().collect();
        for path in frequency_by_path.keys() {
            if !recency_by_path.contains_key(*path) {
                candidates.push(*path);
            }
        }
        let extra: Vec<String> = tag_signals
            .iter()
            .flat_map(|m| m.keys().cloned())
            .filter(|p| {
                !recency_by_path.contains_key(p.as_str())
                    && !frequency_by_path.contains_key(p.as_str())
            })
            .collect();
        candidates.extend(extra.iter().map(String::as_str));

        let mut ranked: Vec<RankedFile> = candidates
            .into_iter()
            .map(|path| {
                let r = recency_by_path
                    .get(path)
                    .map_or(0.0, |ts| recency_signal(now, *ts));
                let f = frequency_by_path
                    .get(path)
                    .map_or(0.0, |count| frequency_signal(*count));
                let t = if tag_signals.is_empty() {
                    0.0
                } else {
                    tag_signals
                        .iter()
                        .map(|m| m.get(path).copied().unwrap_or(0.0))
                        .sum::<f64>()
                        / tag_signals.len() as f64
                };
                RankedFile {
                    path: path.to_string(),
                    recency: r,
                    frequency: f,
                    tag: t,
                    composite: weights.recency * r + weights.frequency * f + weights.tag * t,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.composite
                .partial_cmp(&a.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Multiplicative decay of recency scores. Never runs implicitly;
    /// callers invoke it from an explicit maintenance endpoint.
    pub fn apply_decay(&self, half_life_secs: u64, now: u64) -> usize {
        let key = self.keys.recency();
        let members = self.store.zrange_desc(&key, usize::MAX);
        let mut affected = 0;
        for (path, score) in members {
            let age = now as f64 - score;
            if age > 0.0 {
                let factor = 0.5f64.powf(age / half_life_secs as f64);
                self.store.zadd(&key, &path, score * factor);
                affected += 1;
            }
        }
        affected
    }

    /// All tags ever seen for this project with their file counts,
    /// most-populated first.
    #[must_use]
    pub fn all_tags(&self) -> Vec<(String, u64)> {
        let prefix = self.keys.tag_prefix();
        let mut tags: Vec<(String, u64)> = self
            .store
            .keys_with_prefix(&prefix)
            .into_iter()
            .map(|key| {
                let count = self.store.zcard(&key) as u64;
                (key[prefix.len()..].to_string(), count)
            })
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags
    }

    /// Files with affinity for a tag, strongest first.
    #[must_use]
    pub fn files_for_tag(&self, tag: &str, limit: usize) -> Vec<String> {
        self.store
            .zrange_desc(&self.keys.tag(tag), limit)
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    /// Tags attached to a path; falls back to suffix matching so callers
    /// can pass a bare filename.
    #[must_use]
    pub fn tags_for_file(&self, path: &str) -> Vec<String> {
        let exact = self.store.smembers(&self.keys.path_tags(path));
        if !exact.is_empty() {
            let mut tags: Vec<String> = exact.into_iter().collect();
            tags.sort();
            return tags;
        }
        let prefix = format!("{}:ptags:", self.keys.project());
        for key in self.store.keys_with_prefix(&prefix) {
            let candidate = &key[prefix.len()..];
            if candidate.ends_with(path) || candidate.contains(path) {
                let mut tags: Vec<String> = self.store.smembers(&key).into_iter().collect();
                tags.sort();
                return tags;
            }
        }
        Vec::new()
    }

    #[must_use]
    pub fn files_tracked(&self) -> usize {
        self.store.zcard(&self.keys.recency())
    }
}
