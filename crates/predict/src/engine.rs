//! The prediction pipeline: intent in, ranked file candidates out, with a
//! logged record so later reads can grade the prediction.

use crate::cache::{CachedCandidate, IntentCache};
use crate::keywords;
use crate::ledger::PredictionLedger;
use crate::patterns;
use crate::tuner::{ArmSelection, Tuner};
use foresight_ranking::{
    frequency_signal, recency_signal, Keys, ScoreStore, Scorer, TransitionTracker, Weights,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Reasons an empty prediction is still a successful response.
pub const REASON_COLD_START: &str = "cold_start";
pub const REASON_BELOW_FLOOR: &str = "below_floor";
pub const REASON_NO_KEYWORDS: &str = "no_keywords";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Below this top-1 confidence nothing is predicted at all.
    pub confidence_floor: f64,
    /// Between floor and this, predictions are logged but marked invisible.
    pub show_threshold: f64,
    pub default_limit: usize,
    /// Candidates pulled per source (tag, transitions, recency).
    pub candidate_pool: usize,
    /// Fixed transition weight applied when an anchor is present.
    pub transition_weight: f64,
    pub snippet_max_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.40,
            show_threshold: 0.60,
            default_limit: 5,
            candidate_pool: 10,
            transition_weight: 0.2,
            snippet_max_lines: 15,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictInput {
    pub intent: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub current_file: Option<String>,
    pub session: String,
    pub snippet_lines: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicted {
    pub path: String,
    pub confidence: f64,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PredictOutcome {
    pub files: Vec<Predicted>,
    pub top_confidence: f64,
    pub confidence_spread: f64,
    pub cached: bool,
    pub visible: bool,
    pub reason: Option<&'static str>,
    pub arm: Option<ArmSelection>,
}

impl PredictOutcome {
    fn empty(reason: &'static str) -> Self {
        Self {
            files: Vec::new(),
            top_confidence: 0.0,
            confidence_spread: 0.0,
            cached: false,
            visible: false,
            reason: Some(reason),
            arm: None,
        }
    }
}

/// Per-project prediction engine. Owns every learner bound to the same
/// project-scoped keyspace.
pub struct PredictionEngine {
    store: Arc<dyn ScoreStore>,
    keys: Keys,
    scorer: Scorer,
    transitions: TransitionTracker,
    tuner: Tuner,
    ledger: PredictionLedger,
    cache: IntentCache,
    config: EngineConfig,
    root: PathBuf,
    index_probe: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl PredictionEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn ScoreStore>,
        keys: Keys,
        root: PathBuf,
        config: EngineConfig,
    ) -> Self {
        Self {
            scorer: Scorer::new(Arc::clone(&store), keys.clone()),
            transitions: TransitionTracker::new(Arc::clone(&store), keys.clone()),
            tuner: Tuner::new(Arc::clone(&store), keys.clone()),
            ledger: PredictionLedger::new(Arc::clone(&store), keys.clone()),
            cache: IntentCache::new(Arc::clone(&store), keys.clone()),
            store,
            keys,
            config,
            root,
            index_probe: None,
        }
    }

    /// Restrict cached results to paths the symbol index still knows.
    pub fn set_index_probe(&mut self, probe: Arc<dyn Fn(&str) -> bool + Send + Sync>) {
        self.index_probe = Some(probe);
    }

    #[must_use]
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    #[must_use]
    pub fn transitions(&self) -> &TransitionTracker {
        &self.transitions
    }

    #[must_use]
    pub fn tuner(&self) -> &Tuner {
        &self.tuner
    }

    #[must_use]
    pub fn ledger(&self) -> &PredictionLedger {
        &self.ledger
    }

    #[must_use]
    pub fn cache(&self) -> &IntentCache {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn ScoreStore> {
        Arc::clone(&self.store)
    }

    /// Run the full prediction pipeline.
    pub async fn predict(&self, input: PredictInput, now_ms: u64) -> PredictOutcome {
        let limit = input.limit.unwrap_or(self.config.default_limit).max(1);

        // 1-2. Keywords, then tags.
        let keywords = match input.keywords {
            Some(keywords) => keywords,
            None => keywords::extract_keywords(input.intent.as_deref().unwrap_or("")),
        };
        if keywords.is_empty() && input.current_file.is_none() {
            return PredictOutcome::empty(REASON_NO_KEYWORDS);
        }
        let tags = patterns::infer_tags(&keywords.join(" "));
        let fingerprint = keywords::fingerprint(&keywords);

        // 3. Cache probe. Anchored predictions depend on the anchor's
        // transition state, so only anchor-free queries hit the cache.
        if input.current_file.is_none() {
            if let Some(cached) = self.cache.get(&fingerprint) {
                let files: Vec<Predicted> = cached
                    .into_iter()
                    .filter(|c| self.path_indexed(&c.path))
                    .take(limit)
                    .map(|c| Predicted {
                        path: c.path,
                        confidence: c.confidence,
                        snippet: None,
                    })
                    .collect();
                if !files.is_empty() {
                    let top = files[0].confidence;
                    let spread = top - files.last().map_or(top, |f| f.confidence);
                    let mut outcome = PredictOutcome {
                        top_confidence: top,
                        confidence_spread: spread,
                        cached: true,
                        visible: top >= self.config.show_threshold,
                        reason: None,
                        arm: None,
                        files,
                    };
                    self.fetch_snippets(&mut outcome.files, input.snippet_lines).await;
                    return outcome;
                }
            }
        }

        // 4. Candidate assembly.
        let pool = self.config.candidate_pool;
        let mut candidates: Vec<String> = Vec::new();
        let push = |path: String, list: &mut Vec<String>| {
            if !list.contains(&path) {
                list.push(path);
            }
        };

        for tag in &tags {
            for (path, _) in self.scorer.top_by_tag(tag, pool) {
                push(path, &mut candidates);
            }
        }

        // Transition evidence: the anchor's outgoing edges, or a
        // recency-decayed blend over the session's last accesses.
        let mut transition_scores: HashMap<String, f64> = HashMap::new();
        if let Some(anchor) = &input.current_file {
            for out in self.transitions.transitions_from(anchor, pool) {
                transition_scores.insert(out.to.clone(), out.probability);
                push(out.to, &mut candidates);
            }
        } else if !input.session.is_empty() {
            for (path, blended) in self.transitions.predict_from_recent(&input.session, pool) {
                transition_scores.insert(path.clone(), blended.min(1.0));
                push(path, &mut candidates);
            }
        }

        for (path, _) in self.scorer.top_by_recency(pool) {
            push(path, &mut candidates);
        }

        if let Some(anchor) = &input.current_file {
            candidates.retain(|c| c != anchor);
        }
        if candidates.is_empty() {
            return PredictOutcome::empty(REASON_COLD_START);
        }

        // 5. Arm selection.
        let arm = self.tuner.select_arm();

        // 6. Composite scoring on normalized signals.
        let now_s = now_ms / 1_000;
        let tag_maxima: Vec<f64> = tags
            .iter()
            .map(|tag| self.scorer.max_tag_score(tag).unwrap_or(0.0))
            .collect();
        let use_transition_term = !transition_scores.is_empty();

        let mut scored: Vec<(String, f64)> = candidates
            .into_iter()
            .map(|path| {
                let score = self.composite_score(
                    &path,
                    &tags,
                    &tag_maxima,
                    &transition_scores,
                    arm.weights,
                    use_transition_term,
                    now_s,
                );
                (path, score)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        // 7. Confidence against the decayed reference maximum.
        let top_score = scored[0].1;
        let reference = self.reference_max(top_score, now_ms);
        let mut files: Vec<Predicted> = scored
            .into_iter()
            .map(|(path, score)| Predicted {
                path,
                confidence: (score / reference).min(1.0),
                snippet: None,
            })
            .collect();
        let top_confidence = files[0].confidence;
        let confidence_spread =
            top_confidence - files.last().map_or(top_confidence, |f| f.confidence);

        // 8. Threshold gates.
        if top_confidence < self.config.confidence_floor {
            return PredictOutcome::empty(REASON_BELOW_FLOOR);
        }
        let visible = top_confidence >= self.config.show_threshold;

        // 9. Snippets.
        self.fetch_snippets(&mut files, input.snippet_lines).await;

        // 10. Log for hit/miss attribution.
        let candidate_paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        self.ledger.log_prediction(
            &input.session,
            &fingerprint,
            arm.index,
            &candidate_paths,
            now_ms,
        );

        // 11. Cache anchor-free results.
        if input.current_file.is_none() {
            let cached: Vec<CachedCandidate> = files
                .iter()
                .map(|f| CachedCandidate {
                    path: f.path.clone(),
                    confidence: f.confidence,
                })
                .collect();
            self.cache.put(&fingerprint, &cached);
        }

        PredictOutcome {
            files,
            top_confidence,
            confidence_spread,
            cached: false,
            visible,
            reason: None,
            arm: Some(arm),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn composite_score(
        &self,
        path: &str,
        tags: &[String],
        tag_maxima: &[f64],
        transition_scores: &HashMap<String, f64>,
        weights: Weights,
        use_transition_term: bool,
        now_s: u64,
    ) -> f64 {
        let recency = self
            .scorer
            .last_access(path)
            .map_or(0.0, |last| recency_signal(now_s, last));
        let frequency = frequency_signal(self.scorer.access_count(path));
        let tag = if tags.is_empty() {
            0.0
        } else {
            tags.iter()
                .zip(tag_maxima)
                .map(|(tag, max)| {
                    if *max <= 0.0 {
                        0.0
                    } else {
                        self.scorer.tag_score(path, tag).unwrap_or(0.0) / max
                    }
                })
                .sum::<f64>()
                / tags.len() as f64
        };

        let base =
            weights.recency * recency + weights.frequency * frequency + weights.tag * tag;
        if use_transition_term {
            let transition = transition_scores.get(path).copied().unwrap_or(0.0);
            let wt = self.config.transition_weight;
            (1.0 - wt) * base + wt * transition
        } else {
            base
        }
    }

    /// Exponentially decayed running maximum of composite scores, floored
    /// so the first prediction after cold start cannot claim full
    /// confidence.
    fn reference_max(&self, top_score: f64, now_ms: u64) -> f64 {
        let floor = Weights::default().recency + Weights::default().frequency * frequency_signal(1.0);
        let key = self.keys.counters();
        let stored = self
            .store
            .hget(&key, "reference_max")
            .and_then(|v| v.parse::<f64>().ok());
        let stored_at = self
            .store
            .hget(&key, "reference_max_at")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(now_ms);

        let decayed = stored.map_or(floor, |value| {
            let age_hours = now_ms.saturating_sub(stored_at) as f64 / 3_600_000.0;
            (value * 0.5f64.powf(age_hours)).max(floor)
        });

        let reference = decayed.max(top_score);
        if top_score >= decayed {
            self.store.hset(&key, "reference_max", &reference.to_string());
            self.store.hset(&key, "reference_max_at", &now_ms.to_string());
        }
        reference.max(f64::MIN_POSITIVE)
    }

    fn path_indexed(&self, path: &str) -> bool {
        match &self.index_probe {
            Some(probe) => probe(path),
            None => true,
        }
    }

    async fn fetch_snippets(&self, files: &mut [Predicted], snippet_lines: Option<usize>) {
        let Some(lines) = snippet_lines else { return };
        let lines = lines.min(self.config.snippet_max_lines).max(1);
        for file in files.iter_mut() {
            let full_path = if std::path::Path::new(&file.path).is_absolute() {
                PathBuf::from(&file.path)
            } else {
                self.root.join(&file.path)
            };
            match tokio::fs::read_to_string(&full_path).await {
                Ok(content) => {
                    let snippet: Vec<&str> = content.lines().take(lines).collect();
                    file.snippet = Some(snippet.join("\n"));
                }
                Err(err) => {
                    // The path is still returned; only the snippet is lost.
                    log::debug!("snippet read failed for {}: {err}", full_path.display());
                }
            }
        }
    }
}
