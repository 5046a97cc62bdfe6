use crate::app::{AppConfig, AppState, ProjectContext};
use crate::http_api::app_router;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use std::fs;
use std::sync::Arc;
use tower::util::ServiceExt;

pub(super) struct TestHarness {
    _project_dir: tempfile::TempDir,
    _data_dir: tempfile::TempDir,
    pub(super) router: Router,
    pub(super) project: Arc<ProjectContext>,
}

impl TestHarness {
    pub(super) async fn setup() -> Self {
        let project_dir = tempfile::tempdir().expect("project tempdir");
        let data_dir = tempfile::tempdir().expect("data tempdir");

        fs::create_dir_all(project_dir.path().join("src")).expect("mkdir src");
        fs::write(
            project_dir.path().join("src/auth.rs"),
            "fn login_user() {}\nfn verify_token() {}\n",
        )
        .expect("seed auth.rs");
        fs::write(
            project_dir.path().join("src/routes.rs"),
            "fn register_routes() { login_user(); }\n",
        )
        .expect("seed routes.rs");
        fs::write(
            project_dir.path().join("src/handler.rs"),
            "fn dispatch() {}\n",
        )
        .expect("seed handler.rs");

        let mut config = AppConfig::with_data_dir(data_dir.path().to_path_buf());
        config.watch = false;

        let state = AppState::initialize(config).await.expect("state init");
        let project = state
            .enable_project(project_dir.path())
            .await
            .expect("enable project");
        let router = app_router(state);

        Self {
            _project_dir: project_dir,
            _data_dir: data_dir,
            router,
            project,
        }
    }

    pub(super) async fn get(&self, path: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    pub(super) async fn post_json(&self, path: &str, body: serde_json::Value) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response")
    }
}

pub(super) async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("decode json")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
