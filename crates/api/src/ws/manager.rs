use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use lunara_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// One authenticated socket.
pub struct WsConnection {
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Live sockets grouped by owning user.
///
/// Job updates are only ever addressed to a single user, so lookups go
/// straight to that user's sockets. Wrap in `Arc` to share.
pub struct WsManager {
    users: RwLock<HashMap<DbId, HashMap<String, WsConnection>>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Register a socket for `user_id`. The returned receiver feeds the
    /// socket's outbound sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (sender, rx) = mpsc::unbounded_channel();
        self.users.write().await.entry(user_id).or_default().insert(
            conn_id,
            WsConnection {
                sender,
                connected_at: chrono::Utc::now(),
            },
        );
        rx
    }

    /// Drop a socket; unknown ids are ignored.
    pub async fn remove(&self, conn_id: &str) {
        let mut users = self.users.write().await;
        users.retain(|_, sockets| {
            sockets.remove(conn_id);
            !sockets.is_empty()
        });
    }

    /// Hand `message` to every socket of `user_id`, returning how many
    /// accepted it. Closed channels are skipped; their reader loop removes
    /// them.
    pub async fn send_to_user(&self, user_id: DbId, message: Message) -> usize {
        let users = self.users.read().await;
        let Some(sockets) = users.get(&user_id) else {
            return 0;
        };
        sockets
            .values()
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.users.read().await.values().map(|sockets| sockets.len()).sum()
    }

    /// Close every socket and forget them all. Used on shutdown.
    pub async fn shutdown_all(&self) {
        let drained: Vec<_> = self.users.write().await.drain().collect();
        let mut count = 0;
        for conn in drained.iter().flat_map(|(_, sockets)| sockets.values()) {
            let _ = conn.sender.send(Message::Close(None));
            count += 1;
        }
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Ping every socket; used by the heartbeat task.
    pub async fn ping_all(&self) {
        let users = self.users.read().await;
        for conn in users.values().flat_map(|sockets| sockets.values()) {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
