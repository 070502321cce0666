//! Typed state of one pipeline run.

use indexmap::IndexMap;
use litessay_core::segment::Segment;
use litessay_core::types::{DbId, JobLease};
use litessay_db::models::document::Document;

use crate::error::PipelineError;
use crate::evidence::{EvidenceMap, ExpandedEvidenceMap};

/// Everything a run knows. Each stage fills in its outputs; later stages
/// read them through the `require_*` accessors, which fail with
/// [`PipelineError::MissingInput`] naming the stage and the absent field.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub lease: JobLease,
    pub document_id: DbId,
    pub source_ref: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub namespace: String,

    pub segments: Option<Vec<Segment>>,
    pub book_summary: Option<String>,
    pub themes: Option<Vec<String>>,
    pub evidence: Option<EvidenceMap>,
    pub expanded_evidence: Option<ExpandedEvidenceMap>,
    pub theme_intros: Option<IndexMap<String, String>>,
    pub essay: Option<String>,

    pub revision_count: u32,
    pub essay_approved: bool,
    pub review_feedback: Option<String>,
}

impl StageContext {
    pub fn new(lease: JobLease, document: &Document) -> Self {
        Self {
            lease,
            document_id: document.id,
            source_ref: document.source_ref.clone(),
            title: document.title.clone(),
            author: document.author.clone(),
            namespace: document.vector_namespace.clone(),
            segments: None,
            book_summary: None,
            themes: None,
            evidence: None,
            expanded_evidence: None,
            theme_intros: None,
            essay: None,
            revision_count: 0,
            essay_approved: false,
            review_feedback: None,
        }
    }

    pub fn job_id(&self) -> DbId {
        self.lease.job_id
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }

    pub fn author_or_default(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown Author")
    }

    pub fn require_segments(&self, stage: &'static str) -> Result<&[Segment], PipelineError> {
        require(&self.segments, stage, "segments").map(Vec::as_slice)
    }

    pub fn require_summary(&self, stage: &'static str) -> Result<&str, PipelineError> {
        require(&self.book_summary, stage, "book_summary").map(String::as_str)
    }

    pub fn require_themes(&self, stage: &'static str) -> Result<&[String], PipelineError> {
        require(&self.themes, stage, "themes").map(Vec::as_slice)
    }

    pub fn require_evidence(&self, stage: &'static str) -> Result<&EvidenceMap, PipelineError> {
        require(&self.evidence, stage, "evidence")
    }

    pub fn require_essay(&self, stage: &'static str) -> Result<&str, PipelineError> {
        require(&self.essay, stage, "essay").map(String::as_str)
    }

    pub fn require_feedback(&self, stage: &'static str) -> Result<&str, PipelineError> {
        require(&self.review_feedback, stage, "review_feedback").map(String::as_str)
    }
}

fn require<'a, T>(
    value: &'a Option<T>,
    stage: &'static str,
    field: &'static str,
) -> Result<&'a T, PipelineError> {
    value
        .as_ref()
        .ok_or(PipelineError::MissingInput { stage, field })
}
