//! In-process event fan-out for generation job lifecycle changes.
//!
//! - [`EventBus`] is a publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`] is the envelope published by the job runner and consumed
//!   by the WebSocket notification router.

pub mod bus;

pub use bus::{EventBus, JobEvent};
