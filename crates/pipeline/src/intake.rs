//! Resolve a source reference to a document and queue a pipeline run.

use litessay_core::collaborators::{SourceMetadata, TextSource};
use litessay_core::document::{derive_namespace, SOURCE_TYPE_GUTENBERG};
use litessay_core::hashing::content_hash;
use litessay_core::text::normalize_source_text;
use litessay_db::models::document::{CreateDocument, Document};
use litessay_db::models::job::Job;

use crate::error::PipelineError;
use crate::store::JobStore;

/// Find or create the document for `source_ref`.
///
/// Documents are keyed by the hash of their normalized text, so two
/// references to identical text share one document. An existing document
/// with a missing title or author gets them backfilled. Metadata lookup
/// failures are logged and tolerated; the document is created without it.
pub async fn ensure_document(
    store: &dyn JobStore,
    source: &dyn TextSource,
    source_ref: &str,
) -> Result<Document, PipelineError> {
    let raw = source.fetch(source_ref).await?;
    let normalized = normalize_source_text(&raw);
    let hash = content_hash(&normalized);

    if let Some(existing) = store.find_document_by_hash(&hash).await? {
        if existing.title.is_some() && existing.author.is_some() {
            return Ok(existing);
        }
        let metadata = fetch_metadata(source, source_ref).await;
        if metadata == SourceMetadata::default() {
            return Ok(existing);
        }
        tracing::info!(document_id = existing.id, "Backfilling document metadata");
        return store.backfill_metadata(existing.id, &metadata).await;
    }

    let metadata = fetch_metadata(source, source_ref).await;
    let input = CreateDocument {
        source_type: SOURCE_TYPE_GUTENBERG.to_string(),
        source_ref: source_ref.to_string(),
        vector_namespace: derive_namespace(source_ref, &hash),
        canonical_hash: hash,
        title: metadata.title,
        author: metadata.author,
    };
    let document = store.insert_document(&input).await?;
    tracing::info!(
        document_id = document.id,
        source_ref,
        namespace = %document.vector_namespace,
        "Document registered",
    );
    Ok(document)
}

/// Resolve the document and enqueue an essay job for it.
pub async fn submit_job(
    store: &dyn JobStore,
    source: &dyn TextSource,
    source_ref: &str,
) -> Result<(Document, Job), PipelineError> {
    let document = ensure_document(store, source, source_ref).await?;
    let job = store.enqueue(document.id).await?;
    tracing::info!(job_id = job.id, document_id = document.id, "Job enqueued");
    Ok((document, job))
}

async fn fetch_metadata(source: &dyn TextSource, source_ref: &str) -> SourceMetadata {
    match source.fetch_metadata(source_ref).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(source_ref, error = %e, "Metadata lookup failed, continuing without it");
            SourceMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use litessay_db::models::status::JobStatus;

    use super::*;
    use crate::testing::{MemoryJobStore, StaticTextSource};

    const TEXT: &str = "*** START OF THE PROJECT GUTENBERG EBOOK X ***\n\
        It was a bright cold day in April.\n\n\
        *** END OF THE PROJECT GUTENBERG EBOOK X ***";

    #[tokio::test]
    async fn identical_text_resolves_to_one_document() {
        let store = MemoryJobStore::new();
        let source = StaticTextSource::new(TEXT).with_metadata(Some("Nineteen"), Some("Orwell"));

        let first = ensure_document(&store, &source, "1").await.unwrap();
        let second = ensure_document(&store, &source, "2").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.source_ref, "1");
        assert!(first.vector_namespace.starts_with("gb:1:"));
        assert_eq!(first.title.as_deref(), Some("Nineteen"));
    }

    #[tokio::test]
    async fn missing_author_is_backfilled() {
        let store = MemoryJobStore::new();
        let without = StaticTextSource::new(TEXT).with_metadata(Some("Nineteen"), None);
        let document = ensure_document(&store, &without, "1").await.unwrap();
        assert!(document.author.is_none());

        let with = StaticTextSource::new(TEXT).with_metadata(Some("Other"), Some("Orwell"));
        let document = ensure_document(&store, &with, "1").await.unwrap();
        assert_eq!(document.author.as_deref(), Some("Orwell"));
        assert_eq!(document.title.as_deref(), Some("Nineteen"));
    }

    #[tokio::test]
    async fn metadata_failure_is_tolerated() {
        let store = MemoryJobStore::new();
        let source = StaticTextSource::new(TEXT).failing_metadata();
        let document = ensure_document(&store, &source, "1").await.unwrap();
        assert!(document.title.is_none());
        assert!(document.author.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_creates_nothing() {
        let store = MemoryJobStore::new();
        let source = StaticTextSource::new(TEXT);
        source.fail_next_fetch();
        let result = submit_job(&store, &source, "1").await;
        assert_matches!(result, Err(PipelineError::Collaborator(_)));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn submitted_job_is_queued() {
        let store = MemoryJobStore::new();
        let source = StaticTextSource::new(TEXT);
        let (document, job) = submit_job(&store, &source, "1").await.unwrap();
        assert_eq!(job.document_id, document.id);
        assert_eq!(job.status(), Some(JobStatus::Queued));
    }
}
