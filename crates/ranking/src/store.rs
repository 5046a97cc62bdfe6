//! The keyed score store: ordered-by-score sets, small hashes, plain sets,
//! capped lists, and expiring keys.
//!
//! Every component above this layer speaks these verbs and nothing else, so
//! the embedded implementation can be swapped for a networked one without
//! touching callers. Each verb is atomic with respect to its key.

use crate::error::{RankingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const STORE_FORMAT_VERSION: u32 = 1;

/// Verb surface of the score store. Object-safe so deployments can choose
/// the embedded store or an external one behind `Arc<dyn ScoreStore>`.
pub trait ScoreStore: Send + Sync {
    // Ordered sets
    fn zadd(&self, key: &str, member: &str, score: f64);
    fn zincrby(&self, key: &str, member: &str, delta: f64) -> f64;
    fn zscore(&self, key: &str, member: &str) -> Option<f64>;
    /// Members ordered by score descending, capped at `limit`.
    fn zrange_desc(&self, key: &str, limit: usize) -> Vec<(String, f64)>;
    fn zcard(&self, key: &str) -> usize;
    fn zrem(&self, key: &str, member: &str) -> bool;
    /// Keep only the `keep_top` highest-scored members; returns removed count.
    fn ztrim_top(&self, key: &str, keep_top: usize) -> usize;
    /// Replace the whole sorted set in one atomic step.
    fn zreplace(&self, key: &str, entries: Vec<(String, f64)>);

    // Hashes
    fn hset(&self, key: &str, field: &str, value: &str);
    fn hget(&self, key: &str, field: &str) -> Option<String>;
    fn hgetall(&self, key: &str) -> HashMap<String, String>;
    fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64;

    // Sets
    fn sadd(&self, key: &str, member: &str) -> bool;
    fn smembers(&self, key: &str) -> HashSet<String>;

    // Capped lists (newest first)
    fn lpush_capped(&self, key: &str, value: &str, cap: usize);
    fn lrange(&self, key: &str, limit: usize) -> Vec<String>;

    // Lifecycle
    fn expire(&self, key: &str, ttl: Duration);
    fn del(&self, key: &str) -> bool;
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
    /// Drop every key whose TTL has passed; returns purged count.
    fn sweep_expired(&self) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Value {
    Sorted(HashMap<String, f64>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: Value,
    /// Epoch seconds; `None` means the key never expires.
    expires_at: Option<u64>,
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    format_version: u32,
    entries: HashMap<String, Entry>,
}

/// Embedded single-process store. One mutex over the keyspace: verbs hold
/// it for microseconds, which satisfies the per-key atomicity contract
/// without lock ordering concerns.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Load a persisted snapshot; expired keys are dropped on the way in.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| RankingError::Corrupt(e.to_string()))?;
        if snapshot.format_version != STORE_FORMAT_VERSION {
            return Err(RankingError::Corrupt(format!(
                "unsupported store format {}",
                snapshot.format_version
            )));
        }
        let now = epoch_now();
        let entries = snapshot
            .entries
            .into_iter()
            .filter(|(_, entry)| entry.expires_at.map_or(true, |at| at > now))
            .collect();
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    /// Persist the full keyspace as JSON, atomically.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = {
            let entries = self.entries.lock().expect("store lock poisoned");
            serde_json::to_vec(&Snapshot {
                format_version: STORE_FORMAT_VERSION,
                entries: entries.clone(),
            })?
        };
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn with_entry<R>(
        &self,
        key: &str,
        make: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Value) -> R,
    ) -> R {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let now = epoch_now();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at.is_some_and(|at| at <= now) {
                entries.remove(key);
            }
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: make(),
            expires_at: None,
        });
        f(&mut entry.value)
    }

    fn read_entry<R>(&self, key: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get(key)?;
        if entry.expires_at.is_some_and(|at| at <= epoch_now()) {
            return None;
        }
        Some(f(&entry.value))
    }
}

impl ScoreStore for MemoryStore {
    fn zadd(&self, key: &str, member: &str, score: f64) {
        self.with_entry(
            key,
            || Value::Sorted(HashMap::new()),
            |value| {
                if let Value::Sorted(map) = value {
                    map.insert(member.to_string(), score);
                }
            },
        );
    }

    fn zincrby(&self, key: &str, member: &str, delta: f64) -> f64 {
        self.with_entry(
            key,
            || Value::Sorted(HashMap::new()),
            |value| {
                if let Value::Sorted(map) = value {
                    let score = map.entry(member.to_string()).or_insert(0.0);
                    *score += delta;
                    *score
                } else {
                    0.0
                }
            },
        )
    }

    fn zscore(&self, key: &str, member: &str) -> Option<f64> {
        self.read_entry(key, |value| match value {
            Value::Sorted(map) => map.get(member).copied(),
            _ => None,
        })
        .flatten()
    }

    fn zrange_desc(&self, key: &str, limit: usize) -> Vec<(String, f64)> {
        self.read_entry(key, |value| match value {
            Value::Sorted(map) => {
                let mut pairs: Vec<(String, f64)> =
                    map.iter().map(|(m, s)| (m.clone(), *s)).collect();
                pairs.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                });
                pairs.truncate(limit);
                pairs
            }
            _ => Vec::new(),
        })
        .unwrap_or_default()
    }

    fn zcard(&self, key: &str) -> usize {
        self.read_entry(key, |value| match value {
            Value::Sorted(map) => map.len(),
            _ => 0,
        })
        .unwrap_or(0)
    }

    fn zrem(&self, key: &str, member: &str) -> bool {
        self.with_entry(
            key,
            || Value::Sorted(HashMap::new()),
            |value| match value {
                Value::Sorted(map) => map.remove(member).is_some(),
                _ => false,
            },
        )
    }

    fn ztrim_top(&self, key: &str, keep_top: usize) -> usize {
        self.with_entry(
            key,
            || Value::Sorted(HashMap::new()),
            |value| {
                let Value::Sorted(map) = value else { return 0 };
                if map.len() <= keep_top {
                    return 0;
                }
                let mut pairs: Vec<(String, f64)> =
                    map.iter().map(|(m, s)| (m.clone(), *s)).collect();
                pairs.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                });
                let removed = pairs.split_off(keep_top);
                for (member, _) in &removed {
                    map.remove(member);
                }
                removed.len()
            },
        )
    }

    fn zreplace(&self, key: &str, entries: Vec<(String, f64)>) {
        let mut map = HashMap::with_capacity(entries.len());
        for (member, score) in entries {
            map.insert(member, score);
        }
        let mut all = self.entries.lock().expect("store lock poisoned");
        let expires_at = all.get(key).and_then(|e| e.expires_at);
        all.insert(
            key.to_string(),
            Entry {
                value: Value::Sorted(map),
                expires_at,
            },
        );
    }

    fn hset(&self, key: &str, field: &str, value_str: &str) {
        self.with_entry(
            key,
            || Value::Hash(HashMap::new()),
            |value| {
                if let Value::Hash(map) = value {
                    map.insert(field.to_string(), value_str.to_string());
                }
            },
        );
    }

    fn hget(&self, key: &str, field: &str) -> Option<String> {
        self.read_entry(key, |value| match value {
            Value::Hash(map) => map.get(field).cloned(),
            _ => None,
        })
        .flatten()
    }

    fn hgetall(&self, key: &str) -> HashMap<String, String> {
        self.read_entry(key, |value| match value {
            Value::Hash(map) => map.clone(),
            _ => HashMap::new(),
        })
        .unwrap_or_default()
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64 {
        self.with_entry(
            key,
            || Value::Hash(HashMap::new()),
            |value| {
                if let Value::Hash(map) = value {
                    let current: i64 = map
                        .get(field)
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let next = current + delta;
                    map.insert(field.to_string(), next.to_string());
                    next
                } else {
                    0
                }
            },
        )
    }

    fn sadd(&self, key: &str, member: &str) -> bool {
        self.with_entry(
            key,
            || Value::Set(HashSet::new()),
            |value| match value {
                Value::Set(set) => set.insert(member.to_string()),
                _ => false,
            },
        )
    }

    fn smembers(&self, key: &str) -> HashSet<String> {
        self.read_entry(key, |value| match value {
            Value::Set(set) => set.clone(),
            _ => HashSet::new(),
        })
        .unwrap_or_default()
    }

    fn lpush_capped(&self, key: &str, value_str: &str, cap: usize) {
        self.with_entry(
            key,
            || Value::List(VecDeque::new()),
            |value| {
                if let Value::List(list) = value {
                    list.push_front(value_str.to_string());
                    list.truncate(cap);
                }
            },
        );
    }

    fn lrange(&self, key: &str, limit: usize) -> Vec<String> {
        self.read_entry(key, |value| match value {
            Value::List(list) => list.iter().take(limit).cloned().collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default()
    }

    fn expire(&self, key: &str, ttl: Duration) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(epoch_now() + ttl.as_secs());
        }
    }

    fn del(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.remove(key).is_some()
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let now = epoch_now();
        entries
            .iter()
            .filter(|(key, entry)| {
                key.starts_with(prefix) && entry.expires_at.map_or(true, |at| at > now)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let now = epoch_now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        before - entries.len()
    }
}
