//! Lunara domain core.
//!
//! Pure rules shared by the persistence layer, the generation pipeline, and
//! the HTTP API. Nothing in this crate performs I/O.

pub mod classification;
pub mod error;
pub mod generation;
pub mod job_events;
pub mod quota;
pub mod types;
