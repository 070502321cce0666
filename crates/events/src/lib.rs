//! Job progress reporting.
//!
//! - [`ProgressPublisher`] writes the latest [`ProgressSnapshot`] of a
//!   running job through a lease-guarded [`ProgressWriter`].
//! - [`progress_stream`] turns periodic reads of a job into a change-only
//!   event stream with keepalives and a single terminal event.
//! - [`PgProgressStore`] is the Postgres reader/writer used by the worker.

pub mod progress;
pub mod store;
pub mod stream;

pub use progress::{
    JobProgressView, ProgressError, ProgressPublisher, ProgressReader, ProgressSnapshot,
    ProgressWriter,
};
pub use store::PgProgressStore;
pub use stream::{progress_stream, ProgressEvent, StreamConfig};
