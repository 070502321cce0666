//! Domain types shared by every litessay crate.
//!
//! This crate has zero internal dependencies so that the database layer,
//! the pipeline, the provider clients and the worker binary can all depend
//! on it without cycles.

pub mod collaborators;
pub mod config;
pub mod document;
pub mod error;
pub mod hashing;
pub mod job_events;
pub mod scheduling;
pub mod segment;
pub mod text;
pub mod types;
