use std::sync::Arc;

use lunara_pipeline::{JobStore, QuotaLedger, SubmissionService};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    pub jobs: Arc<dyn JobStore>,
    pub ledger: Arc<dyn QuotaLedger>,
    /// Generation intake (quota, credits, job creation, dispatch).
    pub submission: Arc<SubmissionService>,
}
