//! Row models and DTOs, one module per table.

pub mod artifact;
pub mod document;
pub mod job;
pub mod status;
