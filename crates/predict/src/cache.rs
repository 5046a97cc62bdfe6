//! Fingerprint-keyed cache of prediction candidate lists.

use foresight_ranking::{Keys, ScoreStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const CACHE_TTL: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCandidate {
    pub path: String,
    pub confidence: f64,
}

pub struct IntentCache {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
}

impl IntentCache {
    #[must_use]
    pub fn new(store: Arc<dyn ScoreStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    /// Non-expired cached candidates for a fingerprint. A corrupt payload
    /// invalidates the entry instead of failing the query.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<Vec<CachedCandidate>> {
        let key = self.keys.intent_cache(fingerprint);
        let payload = self.store.hget(&key, "payload")?;
        match serde_json::from_str(&payload) {
            Ok(candidates) => Some(candidates),
            Err(err) => {
                log::warn!("intent cache entry {fingerprint} corrupt ({err}), invalidating");
                self.store.del(&key);
                None
            }
        }
    }

    pub fn put(&self, fingerprint: &str, candidates: &[CachedCandidate]) {
        let key = self.keys.intent_cache(fingerprint);
        match serde_json::to_string(candidates) {
            Ok(payload) => {
                self.store.hset(&key, "payload", &payload);
                self.store.expire(&key, CACHE_TTL);
            }
            Err(err) => log::warn!("failed to serialize cache entry: {err}"),
        }
    }

    pub fn invalidate(&self, fingerprint: &str) -> bool {
        self.store.del(&self.keys.intent_cache(fingerprint))
    }
}
