pub mod generation;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                         WebSocket live updates (?token=)
///
/// /generate                   submit (POST)
/// /generate/status/{job_id}   job status
/// /generate/jobs              caller's jobs
/// /generate/quota             caller's quota and credits
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/generate", generation::router())
}
