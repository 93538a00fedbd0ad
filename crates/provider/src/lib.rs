//! Client for the external generative-video API.
//!
//! - [`VideoProvider`] is the seam the job runner depends on; tests swap in
//!   a scripted implementation.
//! - [`VeoApi`] is the reqwest-backed implementation.
//! - [`extract`] holds the ordered result-locator extractors and operation
//!   parsing, independent of the network.

pub mod api;
pub mod error;
pub mod extract;
pub mod provider;

pub use api::{VeoApi, VeoConfig};
pub use error::ProviderError;
pub use provider::{GenerationRequest, OperationStatus, VideoProvider};
