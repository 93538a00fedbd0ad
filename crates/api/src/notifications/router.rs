//! Event-to-socket routing.
//!
//! [`NotificationRouter`] subscribes to the job event bus and forwards each
//! generation event to the sockets of the user who owns the job. Delivery
//! is best-effort; clients that miss a message still see the final state
//! through the status endpoint.

use std::sync::Arc;

use axum::extract::ws::Message;
use lunara_core::job_events::message_type_for_event;
use lunara_events::JobEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the routing loop until the
    /// [`EventBus`](lunara_events::EventBus) is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event to its owner's sockets. Returns the number of
    /// connections reached.
    pub async fn route_event(&self, event: &JobEvent) -> usize {
        let Some(frame) = build_message(event) else {
            tracing::debug!(event_type = %event.event_type, "No socket message for event");
            return 0;
        };

        let delivered = self
            .ws_manager
            .send_to_user(event.user_id, Message::Text(frame.to_string().into()))
            .await;
        tracing::trace!(
            job_id = event.job_id,
            user_id = event.user_id,
            delivered,
            "Routed job event",
        );
        delivered
    }
}

/// The JSON frame sent to clients for `event`, or `None` for event types
/// that are not forwarded.
pub fn build_message(event: &JobEvent) -> Option<serde_json::Value> {
    let msg_type = message_type_for_event(&event.event_type)?;
    Some(serde_json::json!({
        "type": msg_type,
        "data": event.payload,
        "timestamp": event.timestamp,
    }))
}
