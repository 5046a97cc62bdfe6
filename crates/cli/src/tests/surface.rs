use super::harness::{assert_status, decode_json, TestHarness};
use crate::app::now_s;
use axum::http::StatusCode;
use foresight_protocol as proto;
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_reports_ready_components() {
    let h = TestHarness::setup().await;
    let response = h.get("/health").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::HealthResponse = decode_json(response).await;
    assert_eq!(body.status, "ok");
    assert_eq!(body.components.store, "ready");
    assert_eq!(body.dropped_events, 0);
}

#[tokio::test]
async fn symbol_query_finds_indexed_tokens() {
    let h = TestHarness::setup().await;
    let response = h.get("/symbol?q=verify_token&limit=5").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::QueryResponse = decode_json(response).await;
    assert!(!body.truncated);
    assert_eq!(body.results.len(), 1);
    assert_eq!(body.results[0].path, "src/auth.rs");
    assert_eq!(body.results[0].line, 2);
}

#[tokio::test]
async fn filename_stem_match_outranks_body_match() {
    let h = TestHarness::setup().await;
    // `login_user` appears in both files; `auth` is src/auth.rs's stem.
    let response = h.get("/symbol?q=auth&limit=5").await;
    let body: proto::QueryResponse = decode_json(response).await;
    assert!(!body.results.is_empty());
    assert_eq!(body.results[0].path, "src/auth.rs");
}

#[tokio::test]
async fn multi_and_requires_every_token() {
    let h = TestHarness::setup().await;
    let response = h.get("/multi?q=login_user+verify_token&mode=and").await;
    let body: proto::QueryResponse = decode_json(response).await;
    assert_eq!(body.results.len(), 1);
    assert_eq!(body.results[0].path, "src/auth.rs");

    let response = h.get("/multi?q=login_user+no_such_token&mode=and").await;
    let body: proto::QueryResponse = decode_json(response).await;
    assert!(body.results.is_empty());

    let response = h.get("/multi?q=login_user+no_such_token&mode=or").await;
    let body: proto::QueryResponse = decode_json(response).await;
    assert_eq!(body.results.len(), 2);
}

#[tokio::test]
async fn multi_rejects_bad_mode() {
    let h = TestHarness::setup().await;
    let response = h.get("/multi?q=login&mode=xor").await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    let body: proto::ErrorEnvelope = decode_json(response).await;
    assert_eq!(body.code, proto::ErrorCode::BadQuery);
}

#[tokio::test]
async fn pattern_rejects_invalid_regex_as_bad_query() {
    let h = TestHarness::setup().await;
    let response = h
        .post_json("/pattern", json!({ "patterns": ["fn ("] }))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    let body: proto::ErrorEnvelope = decode_json(response).await;
    assert_eq!(body.code, proto::ErrorCode::BadQuery);
}

#[tokio::test]
async fn pattern_scans_only_the_working_set() {
    let h = TestHarness::setup().await;

    // Nothing accessed yet: the working set is empty.
    let response = h
        .post_json("/pattern", json!({ "patterns": ["fn \\w+"] }))
        .await;
    let body: proto::PatternResponse = decode_json(response).await;
    assert_eq!(body.scanned_paths, 0);
    assert!(body.results.is_empty());

    // Access one file; only it becomes scannable.
    let root = h.project.indexer.root().to_path_buf();
    h.project.engine.scorer().record_access(
        root.join("src/auth.rs").to_string_lossy().as_ref(),
        &[],
        now_s(),
    );
    let response = h
        .post_json("/pattern", json!({ "patterns": ["fn \\w+"] }))
        .await;
    let body: proto::PatternResponse = decode_json(response).await;
    assert_eq!(body.scanned_paths, 1);
    assert_eq!(body.results.len(), 2);
    assert!(body.results.iter().all(|m| m.path == "src/auth.rs"));

    // Explicit all-scope widens to the whole index.
    let response = h
        .post_json(
            "/pattern",
            json!({ "patterns": ["fn \\w+"], "scope": "all" }),
        )
        .await;
    let body: proto::PatternResponse = decode_json(response).await;
    assert_eq!(body.scanned_paths, 3);
}

#[tokio::test]
async fn files_listing_filters_by_match() {
    let h = TestHarness::setup().await;
    let response = h.get("/files?match=auth").await;
    let body: proto::FilesResponse = decode_json(response).await;
    assert_eq!(body.results.len(), 1);
    assert_eq!(body.results[0].path, "src/auth.rs");
    assert_eq!(body.results[0].language, "rust");
}

#[tokio::test]
async fn cold_start_queries_return_well_formed_empties() {
    let h = TestHarness::setup().await;

    let response = h.get("/rank").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::RankResponse = decode_json(response).await;
    assert!(body.files.is_empty());
    assert!(!body.adaptive);

    let response = h
        .post_json("/predict", json!({ "session": "s1", "intent": "fix the login flow" }))
        .await;
    assert_status(&response, StatusCode::OK);
    let body: proto::PredictResponse = decode_json(response).await;
    assert!(body.files.is_empty());
    assert_eq!(body.reason.as_deref(), Some("cold_start"));

    let response = h.get("/predict/stats").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::PredictStatsResponse = decode_json(response).await;
    assert_eq!(body.hits, 0);
    assert_eq!(body.rolling.total, 0);

    let response = h.get("/metrics").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::MetricsResponse = decode_json(response).await;
    assert_eq!(body.hit_at_5, 0.0);
    assert_eq!(body.tuner.arms.len(), 8);

    let response = h.get("/changes").await;
    assert_status(&response, StatusCode::OK);
    let body: proto::ChangesResponse = decode_json(response).await;
    assert!(body.added.is_empty());
}

#[tokio::test]
async fn rank_orders_by_recency_then_frequency_then_tag() {
    let h = TestHarness::setup().await;
    let scorer = h.project.engine.scorer();
    let now = now_s();

    // Recency beats age.
    scorer.record_access("/src/old.py", &[], now - 3_600);
    scorer.record_access("/src/new.py", &[], now);
    let response = h.get("/rank?limit=2").await;
    let body: proto::RankResponse = decode_json(response).await;
    assert_eq!(body.files[0], "/src/new.py");

    // Frequency under equal recency.
    for _ in 0..10 {
        scorer.record_access("/src/new.py", &[], now);
    }
    scorer.record_access("/src/old.py", &[], now);
    let response = h.get("/rank?limit=2").await;
    let body: proto::RankResponse = decode_json(response).await;
    assert_eq!(body.files[0], "/src/new.py");

    // Tag affinity under a tag query.
    scorer.record_access("/routes.py", &["#api".to_string()], now);
    scorer.record_access("/tests/test_routes.py", &["#testing".to_string()], now);
    let response = h.get("/rank?tag=api&limit=5").await;
    let body: proto::RankResponse = decode_json(response).await;
    let routes_pos = body.files.iter().position(|f| f == "/routes.py").unwrap();
    let test_pos = body
        .files
        .iter()
        .position(|f| f == "/tests/test_routes.py")
        .unwrap();
    assert!(routes_pos < test_pos);
}

#[tokio::test]
async fn rank_record_endpoint_feeds_the_scorer() {
    let h = TestHarness::setup().await;
    let response = h
        .post_json(
            "/rank/record",
            json!({ "file": "/src/billing.py", "tags": ["#payments"] }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(h.project.engine.scorer().access_count("/src/billing.py"), 1.0);

    let response = h.get("/intent/files?tag=payments").await;
    let body: proto::TagFilesResponse = decode_json(response).await;
    assert_eq!(body.files, vec!["/src/billing.py".to_string()]);
}

#[tokio::test]
async fn unknown_project_is_rejected_and_missing_active_is_not_ready() {
    let h = TestHarness::setup().await;
    let response = h.get("/symbol?q=x&project=no-such-uuid").await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    // A state with no enabled projects returns 503.
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = crate::app::AppConfig::with_data_dir(data_dir.path().to_path_buf());
    config.watch = false;
    let empty_state = crate::app::AppState::initialize(config).await.unwrap();
    let router = crate::http_api::app_router(empty_state);
    let response = router
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/symbol?q=x")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);
    let body: proto::ErrorEnvelope = decode_json(response).await;
    assert_eq!(body.code, proto::ErrorCode::NotReady);
}

#[tokio::test]
async fn malformed_intent_body_is_bad_request_but_queue_full_is_not() {
    let h = TestHarness::setup().await;
    let response = h.post_json("/intent", json!({ "nonsense": true })).await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    let response = h
        .post_json(
            "/intent",
            json!({
                "tool": "Read",
                "tool_input": { "file_path": "/src/auth.rs" },
                "session_id": "s1",
                "timestamp": 1_700_000_000_000u64
            }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body: proto::IntentAck = decode_json(response).await;
    assert!(body.ok);
}
