//! Capability interfaces for the external services the pipeline consumes.
//!
//! The pipeline only ever talks to these traits. Concrete HTTP clients live
//! in `litessay-providers`; tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Text source
// ---------------------------------------------------------------------------

/// Bibliographic metadata for a source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[async_trait]
pub trait TextSource: Send + Sync {
    /// Fetch the raw (un-normalized) text for `source_ref`.
    async fn fetch(&self, source_ref: &str) -> Result<String, CollaboratorError>;

    /// Fetch title and author for `source_ref`.
    async fn fetch_metadata(&self, source_ref: &str) -> Result<SourceMetadata, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// Chat-style completion.
///
/// Callers that ask for JSON must still tolerate free text in the response.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Embedding model
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed every input, returning one vector per input in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Vector index
// ---------------------------------------------------------------------------

/// Metadata stored alongside each segment vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub document_id: DbId,
    pub paragraph_index: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: SegmentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<SegmentMetadata>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index if it does not exist yet.
    async fn ensure(&self, dimension: usize) -> Result<(), CollaboratorError>;

    /// Insert or overwrite vectors in `namespace`.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), CollaboratorError>;

    /// Return the `top_k` nearest vectors, best first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, CollaboratorError>;
}
