//! Request and response bodies for the HTTP surface.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComponentHealth {
    pub index: String,
    pub store: String,
    pub predictor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
    pub components: ComponentHealth,
    /// Ingest events dropped under backpressure since startup.
    pub dropped_events: u64,
}

// ---------------------------------------------------------------------------
// Symbol queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SymbolHit {
    pub path: String,
    pub line: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryResponse {
    pub results: Vec<SymbolHit>,
    pub ms: f64,
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PatternRequest {
    pub patterns: Vec<String>,
    /// Only scan files accessed within the last N seconds.
    #[serde(default)]
    pub since: Option<u64>,
    /// `working_set` (default) or `all`; full-index scans must be explicit.
    #[serde(default)]
    pub scope: Option<PatternScope>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternScope {
    #[default]
    WorkingSet,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternMatch {
    pub path: String,
    pub line: u32,
    #[serde(rename = "match")]
    pub matched: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PatternResponse {
    pub results: Vec<PatternMatch>,
    pub scanned_paths: usize,
    pub ms: f64,
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// File listing / change log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub mtime: u64,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilesResponse {
    pub results: Vec<FileEntry>,
    pub ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChangesResponse {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub ms: f64,
}

// ---------------------------------------------------------------------------
// Intent ingest + introspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagsResponse {
    pub tags: Vec<TagCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagFilesResponse {
    pub tag: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileTagsResponse {
    pub file: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentRecordView {
    pub timestamp: u64,
    pub session_id: String,
    pub tool: String,
    pub files: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentStatsView {
    pub total_records: u64,
    pub unique_tags: u64,
    pub unique_files: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecentIntentsResponse {
    pub records: Vec<IntentRecordView>,
    pub stats: IntentStatsView,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeightsView {
    pub recency: f64,
    pub frequency: f64,
    pub tag: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankDetail {
    pub path: String,
    pub recency: f64,
    pub frequency: f64,
    pub tag: f64,
    pub composite: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RankResponse {
    pub files: Vec<String>,
    pub details: Vec<RankDetail>,
    pub weights: WeightsView,
    /// Arm name when weights came from the tuner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm: Option<String>,
    pub adaptive: bool,
    pub ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecayResponse {
    pub affected: usize,
    pub half_life_seconds: u64,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PredictRequest {
    /// Free-form intent text; keywords are extracted from it.
    #[serde(default)]
    pub intent: Option<String>,
    /// Pre-extracted keywords; skips extraction when present.
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    /// Anchor file for transition-based prediction.
    #[serde(default)]
    pub current_file: Option<String>,
    pub session: String,
    #[serde(default)]
    pub snippet_lines: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictedFile {
    pub path: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PredictResponse {
    pub files: Vec<PredictedFile>,
    pub top_confidence: f64,
    /// Gap between the top candidate and the last returned one.
    pub confidence_spread: f64,
    pub cached: bool,
    /// Below the show threshold the prediction is logged but not shown.
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Manual prediction log entry posted by external hooks.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PredictLogRequest {
    pub session_id: String,
    pub predicted_files: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PredictLogResponse {
    pub logged: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PredictCheckRequest {
    pub session_id: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PredictCheckResponse {
    pub resolved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinalizeResponse {
    pub finalized: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RollingStats {
    pub window_hours: u64,
    pub total: u64,
    pub evaluated: u64,
    pub pending: u64,
    pub hits: u64,
    pub hit_at_5: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PredictStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub rolling: RollingStats,
    pub tuner: TunerStatsResponse,
}

// ---------------------------------------------------------------------------
// Tuner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TunerArmView {
    pub index: usize,
    pub name: String,
    pub weights: WeightsView,
    pub alpha: f64,
    pub beta: f64,
    /// Posterior mean alpha / (alpha + beta).
    pub mean: f64,
    pub pulls: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TunerStatsResponse {
    pub arms: Vec<TunerArmView>,
    pub best: usize,
    pub total_updates: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TunerSelectionResponse {
    pub arm: usize,
    pub name: String,
    pub weights: WeightsView,
    pub adaptive: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TunerFeedbackRequest {
    pub arm_idx: usize,
    pub hit: bool,
}

// ---------------------------------------------------------------------------
// Unified metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LatencyPercentiles {
    pub count: u64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CumulativeStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetricsResponse {
    pub hit_at_5: f64,
    pub target: f64,
    /// `target - hit_at_5`, clamped at zero once the target is met.
    pub gap: f64,
    pub trend: Trend,
    pub rolling: RollingStats,
    pub tuner: TunerStatsResponse,
    pub cumulative: CumulativeStats,
    /// Per-operation latency percentiles over the last hour.
    pub latency: BTreeMap<String, LatencyPercentiles>,
}
