//! One module per pipeline stage.
//!
//! Each stage reads its inputs from the [`StageContext`](crate::StageContext),
//! publishes progress under its step name, and stores its outputs back on
//! the context.

pub(crate) mod draft;
pub(crate) mod evidence;
pub(crate) mod ingest;
pub(crate) mod intros;
pub(crate) mod persist;
pub(crate) mod review;
pub(crate) mod summarize;
pub(crate) mod themes;
