//! Event names and WebSocket message types for generation job updates.
//!
//! The runner publishes `EVENT_*` names on the event bus; the notification
//! router translates them into `MSG_TYPE_*` frames for the owning user's
//! sockets.

/// Progress changed while the job is still running.
pub const EVENT_GENERATION_PROGRESS: &str = "generation.progress";

/// Job reached `completed`.
pub const EVENT_GENERATION_COMPLETED: &str = "generation.completed";

/// Job reached `failed`.
pub const EVENT_GENERATION_FAILED: &str = "generation.failed";

/// Progress update (status + percentage).
pub const MSG_TYPE_GENERATION_PROGRESS: &str = "generation_progress";

/// Job completed successfully; carries the video URL.
pub const MSG_TYPE_GENERATION_COMPLETED: &str = "generation_completed";

/// Job failed; carries the error code and message.
pub const MSG_TYPE_GENERATION_FAILED: &str = "generation_failed";

/// Map a bus event name to its WebSocket message type.
pub fn message_type_for_event(event_type: &str) -> Option<&'static str> {
    match event_type {
        EVENT_GENERATION_PROGRESS => Some(MSG_TYPE_GENERATION_PROGRESS),
        EVENT_GENERATION_COMPLETED => Some(MSG_TYPE_GENERATION_COMPLETED),
        EVENT_GENERATION_FAILED => Some(MSG_TYPE_GENERATION_FAILED),
        _ => None,
    }
}
