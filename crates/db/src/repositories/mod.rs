//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or any `PgExecutor`) as the first argument.

pub mod document_repo;
pub mod job_artifact_repo;
pub mod job_repo;

pub use document_repo::DocumentRepo;
pub use job_artifact_repo::JobArtifactRepo;
pub use job_repo::{JobRepo, RequeuePolicy};
