//! Progress step names and live-stream event names.
//!
//! Step names are written into the job's progress snapshot by every
//! pipeline stage; stream event names are what a live-update reader emits.

/// Ingestion (fetch, segment, embed, index).
pub const STEP_INGEST: &str = "ingest";

/// Book summarization.
pub const STEP_SUMMARIZE_BOOK: &str = "summarize_book";

/// Theme discovery.
pub const STEP_DISCOVER_THEMES: &str = "discover_themes";

/// Evidence retrieval.
pub const STEP_RETRIEVE_EVIDENCE: &str = "retrieve_evidence";

/// Neighbour context expansion.
pub const STEP_EXPAND_CONTEXT: &str = "expand_context";

/// Theme introductions.
pub const STEP_WRITE_THEME_INTROS: &str = "write_theme_intros";

/// Essay drafting.
pub const STEP_DRAFT_ESSAY: &str = "draft_essay";

/// Essay review.
pub const STEP_REVIEW_ESSAY: &str = "review_essay";

/// Essay revision.
pub const STEP_REVISE_ESSAY: &str = "revise_essay";

/// Artifact persistence.
pub const STEP_PERSIST_RESULTS: &str = "persist_results";

/// A progress snapshot changed.
pub const STREAM_EVENT_PROGRESS: &str = "progress";

/// Idle signal keeping long-poll connections open through proxies.
pub const STREAM_EVENT_KEEPALIVE: &str = "keepalive";

/// The job reached a terminal status. Always the last event.
pub const STREAM_EVENT_DONE: &str = "done";

/// The job does not exist.
pub const STREAM_EVENT_ERROR: &str = "error";
