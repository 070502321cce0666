//! Document entity: the canonical representation of one source text.

use litessay_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{IngestStatus, StatusId};

/// A row from the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub source_type: String,
    pub source_ref: String,
    pub canonical_hash: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub summary_chunk_count: i32,
    pub ingest_status_id: StatusId,
    pub vector_namespace: String,
    pub created_at: Timestamp,
}

impl Document {
    pub fn ingest_status(&self) -> Option<IngestStatus> {
        IngestStatus::from_id(self.ingest_status_id)
    }

    pub fn is_ingested(&self) -> bool {
        self.ingest_status() == Some(IngestStatus::Ready)
    }

    /// The cached summary, if one exists and is non-empty.
    pub fn cached_summary(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// DTO for inserting a new document.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub source_type: String,
    pub source_ref: String,
    pub canonical_hash: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub vector_namespace: String,
}
