#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use lunara_api::auth::jwt::{generate_access_token, JwtConfig};
use lunara_api::config::{LogFormat, MediaConfig, ServerConfig};
use lunara_api::router::build_app_router;
use lunara_api::state::AppState;
use lunara_api::ws::WsManager;
use lunara_core::types::DbId;
use lunara_db::models::generation_job::GenerationJob;
use lunara_db::models::status::GenerationJobStatus;
use lunara_pipeline::memory::MemoryStore;
use lunara_pipeline::{JobQueue, JobReceiver, RunnerConfig, SubmissionService};
use lunara_provider::{VeoApi, VeoConfig};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Build a test `ServerConfig`. An empty `api_key` leaves generation
/// unconfigured.
pub fn test_config(api_key: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        video: VeoConfig {
            api_key: api_key.to_string(),
            // Never contacted: no worker consumes the queue in these tests.
            base_url: "http://127.0.0.1:9".to_string(),
            model: "veo-test".to_string(),
            request_timeout: Duration::from_secs(5),
        },
        media: MediaConfig {
            dir: "./media/videos".to_string(),
            public_path: "/media/videos".to_string(),
        },
        runner: RunnerConfig {
            poll_interval: Duration::ZERO,
            max_poll_attempts: 3,
        },
        log_format: LogFormat::Text,
    }
}

/// The application router over an in-memory store, plus the queue the
/// submission service dispatches to.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub queue: JobReceiver,
    pub ws_manager: Arc<WsManager>,
}

pub fn build_test_app() -> TestApp {
    build_app_with_key("test-api-key")
}

pub fn build_unconfigured_app() -> TestApp {
    build_app_with_key("")
}

fn build_app_with_key(api_key: &str) -> TestApp {
    let config = test_config(api_key);
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(VeoApi::new(config.video.clone()).unwrap());
    let ws_manager = Arc::new(WsManager::new());
    let (queue, receiver) = JobQueue::channel();

    let submission = Arc::new(SubmissionService::new(
        store.clone(),
        store.clone(),
        provider,
        queue,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        jobs: store.clone(),
        ledger: store.clone(),
        submission,
    };

    TestApp {
        app: build_app_router(state, &config),
        store,
        queue: receiver,
        ws_manager,
    }
}

pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config("").jwt).unwrap()
}

/// A stored job row in the given state, owned by `user_id`.
pub fn job_row(id: DbId, user_id: DbId, status: GenerationJobStatus) -> GenerationJob {
    let now = Utc::now();
    GenerationJob {
        id,
        user_id,
        prompt: "lanterns drifting over a river".to_string(),
        enhanced_prompt: None,
        length_secs: 5,
        duration_secs: 6,
        aspect_ratio: "16:9".to_string(),
        style: None,
        status_id: status.id(),
        progress: 0,
        operation_name: None,
        poll_attempts: 0,
        video_url: None,
        error_code: None,
        error_message: None,
        raw_api_response: None,
        credits_charged: 10,
        created_at: now,
        started_at: None,
        completed_at: None,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    post_raw_auth(app, uri, body.to_string(), token).await
}

pub async fn post_raw_auth(app: Router, uri: &str, body: String, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
