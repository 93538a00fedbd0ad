//! Provider-neutral request and status types plus the [`VideoProvider`]
//! trait.

use async_trait::async_trait;
use lunara_core::classification::ProviderFailure;
use lunara_core::generation::AspectRatio;

use crate::error::ProviderError;

/// What the runner asks the provider to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Prompt after style and aesthetic enhancement.
    pub prompt: String,
    /// Already clamped to a supported duration.
    pub duration_secs: i32,
    pub aspect_ratio: AspectRatio,
}

/// Snapshot of a long-running provider operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStatus {
    pub done: bool,
    /// Error payload reported by a finished operation.
    pub error: Option<ProviderFailure>,
    /// Number of outputs withheld by content moderation.
    pub moderation_filtered_count: u32,
    pub moderation_reasons: Vec<String>,
    /// Result locator, when one of the known response shapes carried it.
    pub video_uri: Option<String>,
    /// The operation body as received, for diagnostics.
    pub raw: serde_json::Value,
}

/// External video-generation backend.
///
/// Implementations must be cheap to share (`Arc<dyn VideoProvider>`); the
/// runner holds one for the lifetime of the process.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Whether credentials are present. Checked before any job is created.
    fn is_configured(&self) -> bool;

    /// Start a generation; returns the opaque operation handle.
    async fn submit(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    /// Query an operation started by [`submit`](Self::submit).
    async fn poll(&self, operation_name: &str) -> Result<OperationStatus, ProviderError>;

    /// Download the asset a finished operation points at.
    async fn fetch_asset(&self, locator: &str) -> Result<Vec<u8>, ProviderError>;
}
