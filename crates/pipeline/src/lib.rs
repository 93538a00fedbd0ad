//! Asynchronous video generation pipeline.
//!
//! - [`submit`] turns a validated request into a charged, persisted
//!   `pending` job and hands it to the [`queue`].
//! - [`runner`] drives one job through
//!   `pending → processing → polling → downloading → completed` (or
//!   `failed`), never propagating errors past its boundary.
//! - [`worker`] owns the queue consumer, tracks in-flight runners and
//!   performs startup [`recovery`].
//! - [`store`] and [`storage`] are the persistence and file seams, with
//!   Postgres ([`pg`]), in-memory ([`memory`]) and local filesystem
//!   implementations.

pub mod memory;
pub mod pg;
pub mod queue;
pub mod recovery;
pub mod runner;
pub mod storage;
pub mod store;
pub mod submit;
pub mod worker;

pub use queue::{JobQueue, JobReceiver};
pub use runner::{GenerationRunner, RunnerConfig};
pub use storage::{LocalVideoStorage, StorageError, VideoStorage};
pub use store::{JobStore, MediaCatalog, QuotaLedger, StoreError};
pub use submit::{GenerationParams, SubmissionService, SubmitError, SubmittedJob};
pub use worker::GenerationWorker;
