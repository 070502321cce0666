//! The litessay worker: polls the job queue and runs the essay pipeline.
//!
//! - [`WorkerLoop`] claims one job at a time and records failures.
//! - [`spawn_heartbeat`] keeps the running job's lease fresh.
//! - [`WorkerConfig`] is the environment-derived configuration.
//! - [`reports`] backs the operator `status`, `result` and `stale` commands.

pub mod config;
pub mod heartbeat;
pub mod reports;
pub mod worker_loop;

pub use config::{ConfigError, WorkerConfig};
pub use heartbeat::spawn_heartbeat;
pub use worker_loop::{JobOutcome, WorkerLoop};
