//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the create / update DTOs its repository accepts.

pub mod generation_job;
pub mod media;
pub mod status;
pub mod user_quota;
