//! Integration tests for document dedupe and artifact persistence.

use litessay_core::document::{derive_namespace, JOB_TYPE_ESSAY_PIPELINE, SOURCE_TYPE_GUTENBERG};
use litessay_core::hashing::content_hash;
use litessay_db::models::artifact::{ArtifactType, NewArtifact};
use litessay_db::models::document::CreateDocument;
use litessay_db::models::status::IngestStatus;
use litessay_db::repositories::{DocumentRepo, JobArtifactRepo, JobRepo};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_document(source_ref: &str, text: &str) -> CreateDocument {
    let hash = content_hash(text);
    CreateDocument {
        source_type: SOURCE_TYPE_GUTENBERG.to_string(),
        source_ref: source_ref.to_string(),
        vector_namespace: derive_namespace(source_ref, &hash),
        canonical_hash: hash,
        title: None,
        author: None,
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_identical_text_resolves_to_same_document(pool: PgPool) {
    let a = DocumentRepo::insert_or_get(&pool, &new_document("1342", "same text"))
        .await
        .unwrap();
    let b = DocumentRepo::insert_or_get(&pool, &new_document("1342", "same text"))
        .await
        .unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.vector_namespace, b.vector_namespace);
    assert_eq!(a.ingest_status(), Some(IngestStatus::Pending));

    let c = DocumentRepo::insert_or_get(&pool, &new_document("1342", "other text"))
        .await
        .unwrap();
    assert_ne!(a.id, c.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_backfill_keeps_existing_metadata(pool: PgPool) {
    let doc = DocumentRepo::insert_or_get(&pool, &new_document("84", "frankenstein"))
        .await
        .unwrap();

    let filled = DocumentRepo::backfill_metadata(&pool, doc.id, Some("Frankenstein"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(filled.title.as_deref(), Some("Frankenstein"));
    assert!(filled.author.is_none());

    let again = DocumentRepo::backfill_metadata(&pool, doc.id, Some("Other"), Some("Shelley"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.title.as_deref(), Some("Frankenstein"));
    assert_eq!(again.author.as_deref(), Some("Shelley"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ingest_status_and_summary_cache(pool: PgPool) {
    let doc = DocumentRepo::insert_or_get(&pool, &new_document("11", "alice"))
        .await
        .unwrap();
    assert!(!doc.is_ingested());
    assert!(doc.cached_summary().is_none());

    DocumentRepo::set_ingest_status(&pool, doc.id, IngestStatus::Ready)
        .await
        .unwrap();
    DocumentRepo::cache_summary(&pool, doc.id, "A girl falls down a hole.", 3)
        .await
        .unwrap();

    let doc = DocumentRepo::find_by_id(&pool, doc.id).await.unwrap().unwrap();
    assert!(doc.is_ingested());
    assert_eq!(doc.cached_summary(), Some("A girl falls down a hole."));
    assert_eq!(doc.summary_chunk_count, 3);
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_artifacts_are_stored_by_kind(pool: PgPool) {
    let doc = DocumentRepo::insert_or_get(&pool, &new_document("1342", "text"))
        .await
        .unwrap();
    let job = JobRepo::enqueue(&pool, doc.id, JOB_TYPE_ESSAY_PIPELINE)
        .await
        .unwrap();

    JobArtifactRepo::insert(
        &pool,
        job.id,
        &NewArtifact::json(ArtifactType::ThemesJson, json!(["pride", "class"])),
    )
    .await
    .unwrap();
    JobArtifactRepo::insert(&pool, job.id, &NewArtifact::text(ArtifactType::EssayMd, "# Essay"))
        .await
        .unwrap();

    let artifacts = JobArtifactRepo::list_for_job(&pool, job.id).await.unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0].artifact_type, "themes_json");
    assert_eq!(artifacts[0].blob_json, Some(json!(["pride", "class"])));
    assert!(artifacts[0].blob_text.is_none());
    assert_eq!(artifacts[1].artifact_type, "essay_md");
    assert_eq!(artifacts[1].blob_text.as_deref(), Some("# Essay"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_artifact_kind_rejected(pool: PgPool) {
    let doc = DocumentRepo::insert_or_get(&pool, &new_document("1342", "text"))
        .await
        .unwrap();
    let job = JobRepo::enqueue(&pool, doc.id, JOB_TYPE_ESSAY_PIPELINE)
        .await
        .unwrap();

    let artifact = NewArtifact::text(ArtifactType::SummaryMd, "summary");
    JobArtifactRepo::insert(&pool, job.id, &artifact).await.unwrap();
    let result = JobArtifactRepo::insert(&pool, job.id, &artifact).await;
    assert!(result.is_err(), "Second artifact of the same kind should fail");
}
