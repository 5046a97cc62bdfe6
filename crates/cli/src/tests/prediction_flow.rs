//! End-to-end prediction scenarios: learn, predict, attribute, tune.

use super::harness::{assert_status, decode_json, TestHarness};
use crate::app::{now_ms, now_s};
use axum::http::StatusCode;
use foresight_predict::{FINALIZE_GRACE_SECS, FINALIZE_WINDOW_SECS};
use foresight_protocol as proto;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn anchored_prediction_learns_from_repeated_sequences() {
    let h = TestHarness::setup().await;
    let engine = &h.project.engine;
    let mut now = now_s() - 20_000;
    for _ in 0..10 {
        engine.transitions().observe_access("s1", "/auth.py", now);
        engine.scorer().record_access("/auth.py", &[], now);
        engine.transitions().observe_access("s1", "/session.py", now + 5);
        engine.scorer().record_access("/session.py", &[], now + 5);
        now += 1_000;
    }

    let response = h
        .post_json(
            "/predict",
            json!({ "session": "s1", "current_file": "/auth.py" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body: proto::PredictResponse = decode_json(response).await;
    assert_eq!(body.files[0].path, "/session.py");
    assert!(body.top_confidence >= 0.6, "got {}", body.top_confidence);
    assert!(body.visible);
}

#[tokio::test]
async fn read_event_resolves_prediction_and_rewards_the_arm() {
    let h = TestHarness::setup().await;
    let ledger = h.project.engine.ledger();
    let tuner = h.project.engine.tuner();

    let arm = 2;
    let alpha_before = tuner.arm_state(arm).alpha;
    ledger.log_prediction("s1", "fp", arm, &["/src/auth.rs".to_string()], now_ms());

    let response = h
        .post_json(
            "/intent",
            json!({
                "tool": "Read",
                "tool_input": { "file_path": "/src/auth.rs" },
                "session_id": "s1",
                "timestamp": now_ms()
            }),
        )
        .await;
    assert_status(&response, StatusCode::OK);

    // The capture worker drains asynchronously.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = h.get("/predict/stats").await;
    let body: proto::PredictStatsResponse = decode_json(response).await;
    assert_eq!(body.hits, 1);
    assert_eq!(tuner.arm_state(arm).alpha, alpha_before + 1.0);
}

#[tokio::test]
async fn stale_prediction_finalizes_as_miss() {
    let h = TestHarness::setup().await;
    let ledger = h.project.engine.ledger();
    let tuner = h.project.engine.tuner();

    let arm = 4;
    let stale_ms = now_ms() - (FINALIZE_WINDOW_SECS + FINALIZE_GRACE_SECS + 10) * 1_000;
    ledger.log_prediction("s1", "fp", arm, &["/never_read.py".to_string()], stale_ms);

    let response = h.post_json("/predict/finalize", json!({})).await;
    assert_status(&response, StatusCode::OK);
    let body: proto::FinalizeResponse = decode_json(response).await;
    assert_eq!(body.finalized, 1);

    let response = h.get("/predict/stats").await;
    let stats: proto::PredictStatsResponse = decode_json(response).await;
    assert_eq!(stats.misses, 1);
    assert_eq!(tuner.arm_state(arm).beta, 2.0);
}

#[tokio::test]
async fn predict_check_resolves_manually_logged_predictions() {
    let h = TestHarness::setup().await;
    let response = h
        .post_json(
            "/predict/log",
            json!({
                "session_id": "s9",
                "predicted_files": ["/a.py", "/b.py"],
                "tags": ["auth"]
            }),
        )
        .await;
    assert_status(&response, StatusCode::OK);

    let response = h
        .post_json(
            "/predict/check",
            json!({ "session_id": "s9", "file": "/b.py" }),
        )
        .await;
    let body: proto::PredictCheckResponse = decode_json(response).await;
    assert_eq!(body.resolved, 1);

    // A second check finds nothing left to resolve.
    let response = h
        .post_json(
            "/predict/check",
            json!({ "session_id": "s9", "file": "/b.py" }),
        )
        .await;
    let body: proto::PredictCheckResponse = decode_json(response).await;
    assert_eq!(body.resolved, 0);
}

#[tokio::test]
async fn tuner_surface_reports_and_accepts_feedback() {
    let h = TestHarness::setup().await;

    let response = h.get("/tuner/stats").await;
    let body: proto::TunerStatsResponse = decode_json(response).await;
    assert_eq!(body.arms.len(), 8);
    assert_eq!(body.total_updates, 0);
    assert_eq!(body.arms[2].name, "default");

    let response = h
        .post_json("/tuner/feedback", json!({ "arm_idx": 6, "hit": true }))
        .await;
    assert_status(&response, StatusCode::OK);
    let response = h.get("/tuner/stats").await;
    let body: proto::TunerStatsResponse = decode_json(response).await;
    assert_eq!(body.arms[6].alpha, 2.0);
    assert_eq!(body.total_updates, 1);
    assert_eq!(body.best, 6);

    let response = h
        .post_json("/tuner/feedback", json!({ "arm_idx": 99, "hit": true }))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    let response = h.post_json("/tuner/reset", json!({})).await;
    assert_status(&response, StatusCode::OK);
    let response = h.get("/tuner/stats").await;
    let body: proto::TunerStatsResponse = decode_json(response).await;
    assert_eq!(body.total_updates, 0);

    let response = h.get("/tuner/weights").await;
    let body: proto::TunerSelectionResponse = decode_json(response).await;
    assert!(body.adaptive);
    let sum = body.weights.recency + body.weights.frequency + body.weights.tag;
    assert!((sum - 1.0).abs() < 0.02);
}

#[tokio::test]
async fn context_endpoint_always_includes_snippets() {
    let h = TestHarness::setup().await;
    let root = h.project.indexer.root().to_path_buf();
    let auth_path = root.join("src/auth.rs").to_string_lossy().to_string();
    for _ in 0..20 {
        h.project
            .engine
            .scorer()
            .record_access(&auth_path, &["#authentication".to_string()], now_s());
    }

    let response = h
        .post_json("/context", json!({ "session": "s1", "intent": "auth login" }))
        .await;
    assert_status(&response, StatusCode::OK);
    let body: proto::PredictResponse = decode_json(response).await;
    assert!(!body.files.is_empty());
    let top = &body.files[0];
    assert_eq!(top.path, auth_path);
    assert!(top
        .snippet
        .as_deref()
        .is_some_and(|s| s.contains("login_user")));
}

#[tokio::test]
async fn intent_capture_feeds_recent_and_session_views() {
    let h = TestHarness::setup().await;
    for (i, path) in ["/src/auth.rs", "/src/routes.rs"].iter().enumerate() {
        let response = h
            .post_json(
                "/intent",
                json!({
                    "tool": "Edit",
                    "tool_input": { "file_path": path },
                    "session_id": "sess-a",
                    "timestamp": now_ms() + i as u64
                }),
            )
            .await;
        assert_status(&response, StatusCode::OK);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = h.get("/intent/stats").await;
    let stats: proto::IntentStatsView = decode_json(response).await;
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.sessions, 1);

    let response = h.get("/intent/recent?limit=10").await;
    let recent: proto::RecentIntentsResponse = decode_json(response).await;
    assert_eq!(recent.records.len(), 2);
    // Newest first.
    assert_eq!(recent.records[0].files, vec!["/src/routes.rs".to_string()]);

    let response = h.get("/intent/session?id=sess-a").await;
    let session: Vec<proto::IntentRecordView> = decode_json(response).await;
    assert_eq!(session.len(), 2);
    // Oldest first.
    assert_eq!(session[0].files, vec!["/src/auth.rs".to_string()]);

    let response = h.get("/intent/tags").await;
    let tags: proto::TagsResponse = decode_json(response).await;
    assert!(tags.tags.iter().any(|t| t.tag == "#editing"));

    let response = h.get("/intent/file?path=/src/auth.rs").await;
    let file_tags: proto::FileTagsResponse = decode_json(response).await;
    assert!(file_tags.tags.contains(&"#editing".to_string()));
    assert!(file_tags.tags.contains(&"#authentication".to_string()));
}
