//! The HTTP surface: one localhost port serving the CLI and the host
//! assistant's hooks.
//!
//! Query endpoints carry a hard timeout and return correct prefixes with
//! `truncated: true` when it trips. Ingest (`/intent`) enqueues and
//! returns immediately; its failures never reach the caller.

use crate::app::{now_ms, now_s, AppState, ProjectContext, HIT_RATE_TARGET, QUERY_TIMEOUT, SCAN_TIMEOUT};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use foresight_predict::{
    PredictInput, PredictOutcome, TrendDirection, ARMS, FINALIZE_GRACE_SECS,
    FINALIZE_WINDOW_SECS,
};
use foresight_protocol as proto;
use foresight_ranking::Weights;
use foresight_symbols::QueryMode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Most recently accessed paths a pattern scan may touch.
const WORKING_SET_LIMIT: usize = 50;

pub type ApiResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    BadQuery(String),
    NotReady(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, envelope) = match self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                proto::ErrorEnvelope::new(proto::ErrorCode::BadRequest, message),
            ),
            AppError::BadQuery(message) => (
                StatusCode::BAD_REQUEST,
                proto::ErrorEnvelope::new(proto::ErrorCode::BadQuery, message)
                    .with_hint("check the query or pattern syntax"),
            ),
            AppError::NotReady(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                proto::ErrorEnvelope::new(proto::ErrorCode::NotReady, message)
                    .with_hint("enable a project first, or retry shortly"),
            ),
            AppError::Internal(err) => {
                let correlation_id = uuid::Uuid::new_v4().to_string();
                log::error!("internal error [{correlation_id}]: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    proto::ErrorEnvelope::new(
                        proto::ErrorCode::Internal,
                        "internal error".to_string(),
                    )
                    .with_correlation_id(correlation_id),
                )
            }
        };
        (status, Json(envelope)).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectParam {
    pub project: Option<String>,
}

fn resolve(state: &AppState, project: &Option<String>) -> ApiResult<Arc<ProjectContext>> {
    match project {
        Some(uuid) => state
            .context(uuid)
            .ok_or_else(|| AppError::BadRequest(format!("unknown project '{uuid}'"))),
        None => state
            .active_context()
            .ok_or_else(|| AppError::NotReady("no active project".to_string())),
    }
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/symbol", get(symbol))
        .route("/multi", get(multi))
        .route("/pattern", post(pattern))
        .route("/files", get(files))
        .route("/changes", get(changes))
        .route("/intent", post(intent_ingest))
        .route("/intent/tags", get(intent_tags))
        .route("/intent/files", get(intent_files))
        .route("/intent/file", get(intent_file))
        .route("/intent/recent", get(intent_recent))
        .route("/intent/session", get(intent_session))
        .route("/intent/stats", get(intent_stats))
        .route("/rank", get(rank))
        .route("/rank/record", post(rank_record))
        .route("/rank/decay", post(rank_decay))
        .route("/predict", post(predict))
        .route("/predict/log", post(predict_log))
        .route("/predict/check", post(predict_check))
        .route("/predict/finalize", post(predict_finalize))
        .route("/predict/stats", get(predict_stats))
        .route("/tuner/weights", get(tuner_weights))
        .route("/tuner/best", get(tuner_best))
        .route("/tuner/stats", get(tuner_stats))
        .route("/tuner/feedback", post(tuner_feedback))
        .route("/tuner/reset", post(tuner_reset))
        .route("/metrics", get(metrics))
        .route("/context", get(context_get).post(context_post))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health(State(state): State<Arc<AppState>>) -> Json<proto::HealthResponse> {
    let contexts = state.all_contexts();
    let index_status = if contexts.is_empty() {
        "no_project".to_string()
    } else if contexts.iter().any(|c| {
        c.streaming
            .as_ref()
            .is_some_and(|s| s.health_snapshot().indexing)
    }) {
        "indexing".to_string()
    } else {
        "ready".to_string()
    };
    let dropped_events = contexts.iter().map(|c| c.worker.dropped_count()).sum();

    Json(proto::HealthResponse {
        status: if contexts.is_empty() { "degraded" } else { "ok" }.to_string(),
        components: proto::ComponentHealth {
            index: index_status,
            store: "ready".to_string(),
            predictor: "ready".to_string(),
        },
        dropped_events,
    })
}

// ---------------------------------------------------------------------------
// Symbol queries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SymbolParams {
    q: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn symbol(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolParams>,
) -> ApiResult<Json<proto::QueryResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();
    let limit = params.limit.unwrap_or(20);
    let store = ctx.indexer.store();
    let query = params.q.clone();

    let (results, truncated) = match tokio::time::timeout(
        QUERY_TIMEOUT,
        tokio::task::spawn_blocking(move || store.symbol(&query, limit)),
    )
    .await
    {
        Ok(Ok(results)) => (results, false),
        Ok(Err(join_err)) => return Err(AppError::Internal(anyhow::anyhow!(join_err))),
        Err(_) => (Vec::new(), true),
    };

    let ms = elapsed_ms(started);
    ctx.latency.record("symbol", ms, now_ms());
    Ok(Json(proto::QueryResponse {
        results: results.into_iter().map(symbol_hit).collect(),
        ms,
        truncated,
    }))
}

#[derive(Debug, Deserialize)]
struct MultiParams {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn multi(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MultiParams>,
) -> ApiResult<Json<proto::QueryResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();
    let limit = params.limit.unwrap_or(20);
    let mode = match params.mode.as_deref() {
        None | Some("and") => QueryMode::And,
        Some("or") => QueryMode::Or,
        Some(other) => {
            return Err(AppError::BadQuery(format!(
                "mode must be 'and' or 'or', got '{other}'"
            )))
        }
    };
    let terms: Vec<String> = params
        .q
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if terms.is_empty() {
        return Err(AppError::BadQuery("empty multi query".to_string()));
    }

    let store = ctx.indexer.store();
    let (results, truncated) = match tokio::time::timeout(
        QUERY_TIMEOUT,
        tokio::task::spawn_blocking(move || store.multi(&terms, mode, limit)),
    )
    .await
    {
        Ok(Ok(results)) => (results, false),
        Ok(Err(join_err)) => return Err(AppError::Internal(anyhow::anyhow!(join_err))),
        Err(_) => (Vec::new(), true),
    };

    let ms = elapsed_ms(started);
    ctx.latency.record("multi", ms, now_ms());
    Ok(Json(proto::QueryResponse {
        results: results.into_iter().map(symbol_hit).collect(),
        ms,
        truncated,
    }))
}

async fn pattern(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::PatternRequest>, JsonRejection>,
) -> ApiResult<Json<proto::PatternResponse>> {
    let Json(request) = body.map_err(bad_json)?;
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();

    if request.patterns.is_empty() {
        return Err(AppError::BadQuery("patterns required".to_string()));
    }
    let compiled = foresight_symbols::compile_patterns(&request.patterns)
        .map_err(|e| AppError::BadQuery(e.to_string()))?;

    let scope = request.scope.unwrap_or_default();
    let paths = working_set(&ctx, scope, request.since);
    let limit = request.limit.unwrap_or(50);

    let output = foresight_symbols::scan_paths(
        ctx.indexer.root(),
        &paths,
        &compiled,
        limit,
        SCAN_TIMEOUT,
    )
    .await;

    let ms = elapsed_ms(started);
    ctx.latency.record("pattern", ms, now_ms());
    Ok(Json(proto::PatternResponse {
        results: output
            .hits
            .into_iter()
            .map(|hit| proto::PatternMatch {
                path: hit.path,
                line: hit.line,
                matched: hit.matched,
                context: hit.context,
            })
            .collect(),
        scanned_paths: output.scanned_paths,
        ms,
        truncated: output.truncated,
    }))
}

/// The bounded set of paths a regex scan may read: recently-accessed
/// files known to the index, newest first. `scope: all` widens to the
/// whole index, and only by explicit request.
fn working_set(
    ctx: &ProjectContext,
    scope: proto::PatternScope,
    since: Option<u64>,
) -> Vec<String> {
    let symbol_store = ctx.indexer.store();
    match scope {
        proto::PatternScope::All => symbol_store
            .list_files(None, usize::MAX)
            .into_iter()
            .map(|meta| meta.path)
            .collect(),
        proto::PatternScope::WorkingSet => {
            let cutoff = since.map(|s| now_s().saturating_sub(s) as f64);
            let root = ctx.indexer.root().to_path_buf();
            ctx.engine
                .scorer()
                .top_by_recency(WORKING_SET_LIMIT)
                .into_iter()
                .filter(|(_, ts)| cutoff.map_or(true, |c| *ts >= c))
                .filter_map(|(path, _)| {
                    // Accesses are recorded as absolute paths; the scan
                    // wants index-relative ones.
                    let rel = std::path::Path::new(&path)
                        .strip_prefix(&root)
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or(path);
                    symbol_store.contains_path(&rel).then_some(rel)
                })
                .collect()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FilesParams {
    #[serde(rename = "match")]
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilesParams>,
) -> ApiResult<Json<proto::FilesResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();
    let results = ctx
        .indexer
        .store()
        .list_files(params.pattern.as_deref(), params.limit.unwrap_or(50))
        .into_iter()
        .map(|meta| proto::FileEntry {
            path: meta.path,
            size: meta.size,
            mtime: meta.mtime,
            language: meta.language,
        })
        .collect();
    let ms = elapsed_ms(started);
    ctx.latency.record("files", ms, now_ms());
    Ok(Json(proto::FilesResponse { results, ms }))
}

#[derive(Debug, Deserialize)]
struct ChangesParams {
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    project: Option<String>,
}

async fn changes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChangesParams>,
) -> ApiResult<Json<proto::ChangesResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();

    let since = match params.since.as_deref() {
        None => now_s().saturating_sub(300),
        Some("session") => ctx.changes.session_start(),
        Some(raw) => {
            let seconds: u64 = raw
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid since '{raw}'")))?;
            now_s().saturating_sub(seconds)
        }
    };

    let mut added = Vec::new();
    let mut modified = Vec::new();
    let mut deleted = Vec::new();
    for record in ctx.changes.since(since) {
        match record.change_type {
            foresight_indexer::ChangeType::Added => added.push(record.file),
            foresight_indexer::ChangeType::Modified => modified.push(record.file),
            foresight_indexer::ChangeType::Deleted => deleted.push(record.file),
        }
    }

    let ms = elapsed_ms(started);
    ctx.latency.record("changes", ms, now_ms());
    Ok(Json(proto::ChangesResponse {
        added,
        modified,
        deleted,
        ms,
    }))
}

// ---------------------------------------------------------------------------
// Intent ingest + introspection
// ---------------------------------------------------------------------------

async fn intent_ingest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::IntentEvent>, JsonRejection>,
) -> ApiResult<Json<proto::IntentAck>> {
    let Json(event) = body.map_err(bad_json)?;
    let project = event.project.clone().or(params.project);
    let ctx = resolve(&state, &project)?;

    // Fire-and-forget: a full queue drops the event and still acks.
    let queued = ctx.worker.enqueue(event);
    Ok(Json(proto::IntentAck {
        ok: true,
        reason: (!queued).then(|| "dropped".to_string()),
    }))
}

async fn intent_tags(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::TagsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let tags = ctx
        .engine
        .scorer()
        .all_tags()
        .into_iter()
        .map(|(tag, count)| proto::TagCount { tag, count })
        .collect();
    Ok(Json(proto::TagsResponse { tags }))
}

#[derive(Debug, Deserialize)]
struct TagParam {
    tag: String,
    #[serde(default)]
    project: Option<String>,
}

async fn intent_files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TagParam>,
) -> ApiResult<Json<proto::TagFilesResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let tag = if params.tag.starts_with('#') {
        params.tag.clone()
    } else {
        format!("#{}", params.tag)
    };
    let files = ctx.engine.scorer().files_for_tag(&tag, 100);
    Ok(Json(proto::TagFilesResponse { tag, files }))
}

#[derive(Debug, Deserialize)]
struct PathParam {
    path: String,
    #[serde(default)]
    project: Option<String>,
}

async fn intent_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PathParam>,
) -> ApiResult<Json<proto::FileTagsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let tags = ctx.engine.scorer().tags_for_file(&params.path);
    Ok(Json(proto::FileTagsResponse {
        file: params.path,
        tags,
    }))
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    #[serde(default)]
    since: Option<u64>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn intent_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<proto::RecentIntentsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let since = params.since.map(|s| now_s().saturating_sub(s));
    let records = ctx
        .capture
        .recent(since, params.limit.unwrap_or(50))
        .into_iter()
        .map(intent_record_view)
        .collect();
    Ok(Json(proto::RecentIntentsResponse {
        records,
        stats: intent_stats_view(&ctx),
    }))
}

#[derive(Debug, Deserialize)]
struct SessionParam {
    id: String,
    #[serde(default)]
    project: Option<String>,
}

async fn intent_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParam>,
) -> ApiResult<Json<Vec<proto::IntentRecordView>>> {
    let ctx = resolve(&state, &params.project)?;
    let records = ctx
        .capture
        .session_records(&params.id)
        .into_iter()
        .map(intent_record_view)
        .collect();
    Ok(Json(records))
}

async fn intent_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::IntentStatsView>> {
    let ctx = resolve(&state, &params.project)?;
    Ok(Json(intent_stats_view(&ctx)))
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RankParams {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    adaptive: Option<bool>,
    #[serde(default)]
    project: Option<String>,
}

async fn rank(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankParams>,
) -> ApiResult<Json<proto::RankResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let started = Instant::now();
    let limit = params.limit.unwrap_or(10);
    let adaptive = params.adaptive.unwrap_or(false);

    let (weights, arm) = if adaptive {
        let selection = ctx.engine.tuner().select_arm();
        (selection.weights, Some(selection.name.to_string()))
    } else {
        (Weights::default(), None)
    };

    let tags: Vec<String> = params.tag.iter().map(|t| normalize_tag(t)).collect();
    let ranked = ctx
        .engine
        .scorer()
        .top_composite(&tags, weights, limit, now_s());

    let ms = elapsed_ms(started);
    ctx.latency.record("rank", ms, now_ms());
    Ok(Json(proto::RankResponse {
        files: ranked.iter().map(|r| r.path.clone()).collect(),
        details: ranked
            .into_iter()
            .map(|r| proto::RankDetail {
                path: r.path,
                recency: r.recency,
                frequency: r.frequency,
                tag: r.tag,
                composite: r.composite,
            })
            .collect(),
        weights: weights_view(weights),
        arm,
        adaptive,
        ms,
    }))
}

#[derive(Debug, Deserialize)]
struct RankRecordRequest {
    file: String,
    #[serde(default)]
    tags: Vec<String>,
}

async fn rank_record(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<RankRecordRequest>, JsonRejection>,
) -> ApiResult<Json<proto::IntentAck>> {
    let Json(request) = body.map_err(bad_json)?;
    if request.file.is_empty() {
        return Err(AppError::BadRequest("file required".to_string()));
    }
    let ctx = resolve(&state, &params.project)?;
    ctx.engine
        .scorer()
        .record_access(&request.file, &request.tags, now_s());
    Ok(Json(proto::IntentAck {
        ok: true,
        reason: None,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct DecayRequest {
    #[serde(default)]
    half_life_seconds: Option<u64>,
}

async fn rank_decay(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Option<Json<DecayRequest>>,
) -> ApiResult<Json<proto::DecayResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let half_life = body
        .and_then(|Json(r)| r.half_life_seconds)
        .unwrap_or(3_600);
    if half_life == 0 {
        return Err(AppError::BadRequest("half_life_seconds must be > 0".to_string()));
    }
    let affected = ctx.engine.scorer().apply_decay(half_life, now_s());
    Ok(Json(proto::DecayResponse {
        affected,
        half_life_seconds: half_life,
    }))
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::PredictRequest>, JsonRejection>,
) -> ApiResult<Json<proto::PredictResponse>> {
    let Json(request) = body.map_err(bad_json)?;
    run_predict(&state, &params.project, request, false).await
}

async fn context_post(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::PredictRequest>, JsonRejection>,
) -> ApiResult<Json<proto::PredictResponse>> {
    let Json(request) = body.map_err(bad_json)?;
    run_predict(&state, &params.project, request, true).await
}

#[derive(Debug, Deserialize)]
struct ContextParams {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    current_file: Option<String>,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn context_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ContextParams>,
) -> ApiResult<Json<proto::PredictResponse>> {
    let request = proto::PredictRequest {
        intent: params.intent,
        keywords: None,
        current_file: params.current_file,
        session: params.session.unwrap_or_else(|| "cli".to_string()),
        snippet_lines: None,
        limit: params.limit,
    };
    run_predict(&state, &params.project, request, true).await
}

async fn run_predict(
    state: &AppState,
    project: &Option<String>,
    request: proto::PredictRequest,
    force_snippets: bool,
) -> ApiResult<Json<proto::PredictResponse>> {
    let ctx = resolve(state, project)?;
    let started = Instant::now();

    let snippet_lines = if force_snippets {
        Some(request.snippet_lines.unwrap_or(15))
    } else {
        request.snippet_lines
    };
    let input = PredictInput {
        intent: request.intent,
        keywords: request.keywords,
        current_file: request.current_file,
        session: request.session,
        snippet_lines,
        limit: request.limit,
    };

    let outcome = match tokio::time::timeout(QUERY_TIMEOUT, ctx.engine.predict(input, now_ms()))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => PredictOutcome {
            files: Vec::new(),
            top_confidence: 0.0,
            confidence_spread: 0.0,
            cached: false,
            visible: false,
            reason: Some("timeout"),
            arm: None,
        },
    };

    let ms = elapsed_ms(started);
    ctx.latency.record("predict", ms, now_ms());
    Ok(Json(proto::PredictResponse {
        files: outcome
            .files
            .into_iter()
            .map(|f| proto::PredictedFile {
                path: f.path,
                confidence: f.confidence,
                snippet: f.snippet,
            })
            .collect(),
        top_confidence: outcome.top_confidence,
        confidence_spread: outcome.confidence_spread,
        cached: outcome.cached,
        visible: outcome.visible,
        reason: outcome.reason.map(str::to_string),
    }))
}

async fn predict_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::PredictLogRequest>, JsonRejection>,
) -> ApiResult<Json<proto::PredictLogResponse>> {
    let Json(request) = body.map_err(bad_json)?;
    if request.predicted_files.is_empty() {
        return Err(AppError::BadRequest("predicted_files required".to_string()));
    }
    let ctx = resolve(&state, &params.project)?;

    let fingerprint = foresight_predict::keywords::fingerprint(&request.tags);
    let arm = ctx.engine.tuner().best_arm();
    ctx.engine.ledger().log_prediction(
        &request.session_id,
        &fingerprint,
        arm.index,
        &request.predicted_files,
        now_ms(),
    );
    Ok(Json(proto::PredictLogResponse { logged: 1 }))
}

async fn predict_check(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::PredictCheckRequest>, JsonRejection>,
) -> ApiResult<Json<proto::PredictCheckResponse>> {
    let Json(request) = body.map_err(bad_json)?;
    let ctx = resolve(&state, &params.project)?;

    let arms = ctx
        .engine
        .ledger()
        .resolve_on_access(&request.session_id, &request.file, now_ms());
    for arm in &arms {
        ctx.engine.tuner().update_arm(*arm, true);
    }
    Ok(Json(proto::PredictCheckResponse {
        resolved: arms.len(),
    }))
}

async fn predict_finalize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::FinalizeResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let arms = ctx.engine.ledger().finalize_stale(
        now_ms(),
        FINALIZE_WINDOW_SECS,
        FINALIZE_GRACE_SECS,
    );
    for arm in &arms {
        ctx.engine.tuner().update_arm(*arm, false);
    }
    Ok(Json(proto::FinalizeResponse {
        finalized: arms.len(),
    }))
}

async fn predict_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::PredictStatsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let cumulative = ctx.engine.ledger().cumulative();
    Ok(Json(proto::PredictStatsResponse {
        hits: cumulative.hits,
        misses: cumulative.misses,
        hit_rate: cumulative.hit_rate(),
        rolling: rolling_view(&ctx),
        tuner: tuner_view(&ctx),
    }))
}

// ---------------------------------------------------------------------------
// Tuner
// ---------------------------------------------------------------------------

async fn tuner_weights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::TunerSelectionResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let selection = ctx.engine.tuner().select_arm();
    Ok(Json(proto::TunerSelectionResponse {
        arm: selection.index,
        name: selection.name.to_string(),
        weights: weights_view(selection.weights),
        adaptive: true,
    }))
}

async fn tuner_best(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::TunerSelectionResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let selection = ctx.engine.tuner().best_arm();
    Ok(Json(proto::TunerSelectionResponse {
        arm: selection.index,
        name: selection.name.to_string(),
        weights: weights_view(selection.weights),
        adaptive: false,
    }))
}

async fn tuner_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::TunerStatsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    Ok(Json(tuner_view(&ctx)))
}

async fn tuner_feedback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
    body: Result<Json<proto::TunerFeedbackRequest>, JsonRejection>,
) -> ApiResult<Json<proto::IntentAck>> {
    let Json(request) = body.map_err(bad_json)?;
    if request.arm_idx >= ARMS.len() {
        return Err(AppError::BadRequest(format!(
            "arm_idx must be < {}",
            ARMS.len()
        )));
    }
    let ctx = resolve(&state, &params.project)?;
    ctx.engine.tuner().update_arm(request.arm_idx, request.hit);
    Ok(Json(proto::IntentAck {
        ok: true,
        reason: None,
    }))
}

async fn tuner_reset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::IntentAck>> {
    let ctx = resolve(&state, &params.project)?;
    ctx.engine.tuner().reset_arms();
    Ok(Json(proto::IntentAck {
        ok: true,
        reason: None,
    }))
}

// ---------------------------------------------------------------------------
// Unified metrics
// ---------------------------------------------------------------------------

async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<proto::MetricsResponse>> {
    let ctx = resolve(&state, &params.project)?;
    let rolling = rolling_view(&ctx);
    let cumulative = ctx.engine.ledger().cumulative();

    Ok(Json(proto::MetricsResponse {
        hit_at_5: rolling.hit_at_5,
        target: HIT_RATE_TARGET,
        gap: (HIT_RATE_TARGET - rolling.hit_at_5).max(0.0),
        trend: rolling.trend,
        rolling,
        tuner: tuner_view(&ctx),
        cumulative: proto::CumulativeStats {
            hits: cumulative.hits,
            misses: cumulative.misses,
            hit_rate: cumulative.hit_rate(),
        },
        latency: ctx.latency.all(),
    }))
}

// ---------------------------------------------------------------------------
// Shared view builders
// ---------------------------------------------------------------------------

fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

fn normalize_tag(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{tag}")
    }
}

fn symbol_hit(hit: foresight_symbols::SymbolMatch) -> proto::SymbolHit {
    proto::SymbolHit {
        path: hit.path,
        line: hit.line,
        score: hit.score,
    }
}

fn weights_view(weights: Weights) -> proto::WeightsView {
    proto::WeightsView {
        recency: weights.recency,
        frequency: weights.frequency,
        tag: weights.tag,
    }
}

fn trend_view(trend: TrendDirection) -> proto::Trend {
    match trend {
        TrendDirection::Improving => proto::Trend::Improving,
        TrendDirection::Declining => proto::Trend::Declining,
        TrendDirection::Stable => proto::Trend::Stable,
        TrendDirection::InsufficientData => proto::Trend::InsufficientData,
    }
}

fn rolling_view(ctx: &ProjectContext) -> proto::RollingStats {
    let stats = ctx.engine.ledger().rolling_stats(now_ms());
    proto::RollingStats {
        window_hours: stats.window_hours,
        total: stats.total,
        evaluated: stats.evaluated,
        pending: stats.pending,
        hits: stats.hits,
        hit_at_5: stats.hit_at_k,
        trend: trend_view(stats.trend),
    }
}

fn tuner_view(ctx: &ProjectContext) -> proto::TunerStatsResponse {
    let tuner = ctx.engine.tuner();
    let arms: Vec<proto::TunerArmView> = tuner
        .all_states()
        .into_iter()
        .enumerate()
        .map(|(index, state)| proto::TunerArmView {
            index,
            name: ARMS[index].name.to_string(),
            weights: weights_view(ARMS[index].weights),
            alpha: state.alpha,
            beta: state.beta,
            mean: state.mean(),
            pulls: state.pulls,
        })
        .collect();
    proto::TunerStatsResponse {
        best: tuner.best_arm().index,
        total_updates: tuner.total_updates(),
        arms,
    }
}

fn intent_record_view(record: foresight_predict::IntentRecord) -> proto::IntentRecordView {
    proto::IntentRecordView {
        timestamp: record.timestamp,
        session_id: record.session_id,
        tool: record.tool,
        files: record.files,
        tags: record.tags,
    }
}

fn intent_stats_view(ctx: &ProjectContext) -> proto::IntentStatsView {
    let stats = ctx.capture.stats();
    proto::IntentStatsView {
        total_records: stats.total_records,
        unique_tags: stats.unique_tags,
        unique_files: stats.unique_files,
        sessions: stats.sessions,
    }
}
