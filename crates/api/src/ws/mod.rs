//! WebSocket live-update channel.
//!
//! Connections authenticate with `?token=` on upgrade and only ever receive
//! updates for their own user's jobs.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
