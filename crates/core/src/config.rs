//! Tunables for a single pipeline run.
//!
//! Constructed once at process start (see the worker's `WorkerConfig`) and
//! passed by reference to the engine. Nothing in the workspace reads these
//! values from a global.

use crate::error::CoreError;

/// Default maximum characters in a single segment.
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 2000;

/// Default number of nearest segments retrieved per theme.
pub const DEFAULT_TOP_K_EVIDENCE: usize = 8;

/// Default number of segments folded into the summary per window.
pub const DEFAULT_SUMMARY_CHUNK_SIZE: usize = 40;

/// Default number of neighbouring segments attached on each side of a match.
pub const DEFAULT_EXPAND_CONTEXT_WINDOW: usize = 3;

/// Default cap on review/revise cycles.
pub const DEFAULT_MAX_REVISIONS: u32 = 2;

/// Maximum number of themes kept from discovery.
pub const MAX_THEMES: usize = 6;

/// Maximum evidence snippets shown to the model when writing a theme intro.
pub const MAX_INTRO_SNIPPETS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_segment_chars: usize,
    pub top_k_evidence: usize,
    pub summary_chunk_size: usize,
    pub expand_context_window: usize,
    pub max_revisions: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            top_k_evidence: DEFAULT_TOP_K_EVIDENCE,
            summary_chunk_size: DEFAULT_SUMMARY_CHUNK_SIZE,
            expand_context_window: DEFAULT_EXPAND_CONTEXT_WINDOW,
            max_revisions: DEFAULT_MAX_REVISIONS,
        }
    }
}

impl PipelineConfig {
    /// Reject values that would make a stage loop forever or do nothing.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_segment_chars == 0 {
            return Err(CoreError::Validation(
                "max_segment_chars must be greater than zero".into(),
            ));
        }
        if self.summary_chunk_size == 0 {
            return Err(CoreError::Validation(
                "summary_chunk_size must be greater than zero".into(),
            ));
        }
        if self.top_k_evidence == 0 {
            return Err(CoreError::Validation(
                "top_k_evidence must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
