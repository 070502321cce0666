//! The essay pipeline: a fixed sequence of stages driven by an explicit
//! state machine, plus the job store it runs against.
//!
//! - [`PipelineEngine`] runs one claimed job from ingestion to persisted
//!   artifacts.
//! - [`StageContext`] carries every intermediate result of a run.
//! - [`RevisionController`] bounds the review/revise loop.
//! - [`JobStore`] abstracts the queue and document tables; [`PgJobStore`]
//!   is the Postgres implementation.
//! - [`intake`] resolves a source reference to a document and enqueues a job.

pub mod context;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod intake;
pub mod parse;
pub mod prompts;
pub mod revision;
pub mod store;

mod stages;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::StageContext;
pub use engine::{Collaborators, PipelineEngine, RunReport, Stage};
pub use error::PipelineError;
pub use revision::{ReviewDecision, RevisionController};
pub use store::{JobStore, PgJobStore};
