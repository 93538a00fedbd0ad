//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Shared as `Arc<EventBus>`. Publishing never blocks and never fails: with
//! no subscribers the event is dropped, which is fine because the job store
//! stays the source of truth for status polling.

use chrono::{DateTime, Utc};
use lunara_core::classification::GenerationErrorCode;
use lunara_core::job_events::{
    EVENT_GENERATION_COMPLETED, EVENT_GENERATION_FAILED, EVENT_GENERATION_PROGRESS,
};
use lunara_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A lifecycle change of one generation job, addressed to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"generation.progress"`.
    pub event_type: String,

    pub job_id: DbId,

    /// Owner of the job; notifications are routed to this user only.
    pub user_id: DbId,

    /// Event-specific data (status, progress, video URL, error).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Create an event with an empty payload.
    pub fn new(event_type: impl Into<String>, job_id: DbId, user_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            user_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Replace the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// A job moved to `status` with the given progress percentage.
    pub fn progress(job_id: DbId, user_id: DbId, status: &str, progress: i16) -> Self {
        Self::new(EVENT_GENERATION_PROGRESS, job_id, user_id).with_payload(serde_json::json!({
            "jobId": job_id,
            "status": status,
            "progress": progress,
        }))
    }

    /// A job finished and its video is reachable at `video_url`.
    pub fn completed(job_id: DbId, user_id: DbId, video_url: &str) -> Self {
        Self::new(EVENT_GENERATION_COMPLETED, job_id, user_id).with_payload(serde_json::json!({
            "jobId": job_id,
            "status": "completed",
            "progress": 100,
            "videoUrl": video_url,
        }))
    }

    /// A job failed with a classified error.
    pub fn failed(
        job_id: DbId,
        user_id: DbId,
        code: GenerationErrorCode,
        message: &str,
    ) -> Self {
        Self::new(EVENT_GENERATION_FAILED, job_id, user_id).with_payload(serde_json::json!({
            "jobId": job_id,
            "status": "failed",
            "errorCode": code.as_str(),
            "errorMessage": message,
        }))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Slow receivers observe `RecvError::Lagged` once `capacity` unread events
/// pile up; the oldest are dropped.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
