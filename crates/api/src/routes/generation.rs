//! Route definitions for the `/generate` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generate`.
///
/// ```text
/// POST   /                  -> generate
/// GET    /status/{job_id}   -> get_status
/// GET    /jobs              -> list_jobs
/// GET    /quota             -> get_quota
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::generate))
        .route("/status/{job_id}", get(generation::get_status))
        .route("/jobs", get(generation::list_jobs))
        .route("/quota", get(generation::get_quota))
}
