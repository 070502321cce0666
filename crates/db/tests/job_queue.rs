//! Integration tests for the job queue.
//!
//! Covers claim exclusivity under concurrency, FIFO ordering, delayed
//! claimability, lease-guarded writes, operator requeue and retry.

use assert_matches::assert_matches;
use litessay_core::document::{derive_namespace, JOB_TYPE_ESSAY_PIPELINE, SOURCE_TYPE_GUTENBERG};
use litessay_core::hashing::content_hash;
use litessay_core::types::{DbId, JobLease};
use litessay_db::models::document::CreateDocument;
use litessay_db::models::status::JobStatus;
use litessay_db::repositories::{DocumentRepo, JobRepo, RequeuePolicy};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_document(pool: &PgPool, text: &str) -> DbId {
    let hash = content_hash(text);
    let input = CreateDocument {
        source_type: SOURCE_TYPE_GUTENBERG.to_string(),
        source_ref: "1342".to_string(),
        vector_namespace: derive_namespace("1342", &hash),
        canonical_hash: hash,
        title: None,
        author: None,
    };
    DocumentRepo::insert_or_get(pool, &input).await.unwrap().id
}

async fn enqueue(pool: &PgPool, document_id: DbId) -> DbId {
    JobRepo::enqueue(pool, document_id, JOB_TYPE_ESSAY_PIPELINE)
        .await
        .unwrap()
        .id
}

async fn age_heartbeat(pool: &PgPool, job_id: DbId, secs: f64) {
    sqlx::query(
        "UPDATE jobs SET heartbeat_at = NOW() - make_interval(secs => $2) WHERE id = $1",
    )
    .bind(job_id)
    .bind(secs)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_enqueue_creates_queued_job(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let job = JobRepo::enqueue(&pool, doc, JOB_TYPE_ESSAY_PIPELINE)
        .await
        .unwrap();

    assert_eq!(job.status(), Some(JobStatus::Queued));
    assert!(job.lease().is_none());
    assert!(job.started_at.is_none());
    assert!(job.progress.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_claim_sets_running_and_lease(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let id = enqueue(&pool, doc).await;

    let claimed = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status(), Some(JobStatus::Running));
    assert!(claimed.lease().is_some());
    assert!(claimed.started_at.is_some());
    assert!(claimed.heartbeat_at.is_some());

    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_claim_is_fifo(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let first = enqueue(&pool, doc).await;
    let second = enqueue(&pool, doc).await;

    let a = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let b = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(a.id, first);
    assert_eq!(b.id, second);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_claimers_get_single_winner(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let id = enqueue(&pool, doc).await;

    let (a, b) = tokio::join!(JobRepo::claim_next(&pool), JobRepo::claim_next(&pool));
    let claimed: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();

    assert_eq!(claimed.len(), 1, "exactly one claimer must win");
    assert_eq!(claimed[0].id, id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_many_claimers_never_share_a_job(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    for _ in 0..5 {
        enqueue(&pool, doc).await;
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { JobRepo::claim_next(&pool).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap().unwrap() {
            ids.push(job.id);
        }
    }
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "a job was claimed twice");
    assert!(total <= 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_claim_skips_job_not_yet_due(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let id = enqueue(&pool, doc).await;
    sqlx::query("UPDATE jobs SET next_attempt_at = NOW() + INTERVAL '1 hour' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Lease-guarded writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_progress_and_completion_with_lease(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let lease = job.lease().unwrap();

    let snapshot = json!({"current_step": "ingest", "detail": "Fetching text"});
    assert!(JobRepo::update_progress(&pool, lease, &snapshot).await.unwrap());
    assert!(JobRepo::heartbeat(&pool, lease).await.unwrap());
    assert!(JobRepo::mark_succeeded(&pool, lease).await.unwrap());

    let done = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(done.status(), Some(JobStatus::Succeeded));
    assert!(done.finished_at.is_some());
    assert!(done.lease_token.is_none());
    assert_eq!(done.progress, Some(snapshot));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_wrong_lease_is_rejected(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let forged = JobLease::new(job.id, Uuid::new_v4());

    let snapshot = json!({"current_step": "ingest", "detail": "x"});
    assert!(!JobRepo::update_progress(&pool, forged, &snapshot).await.unwrap());
    assert!(!JobRepo::heartbeat(&pool, forged).await.unwrap());
    assert!(!JobRepo::mark_succeeded(&pool, forged).await.unwrap());

    let still = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(still.status(), Some(JobStatus::Running));
    assert!(still.progress.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_failed_stores_error_snapshot(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let lease = job.lease().unwrap();

    let error = json!({"error": "embedding service unavailable"});
    assert!(JobRepo::mark_failed(&pool, lease, &error).await.unwrap());

    let failed = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status(), Some(JobStatus::Failed));
    assert_eq!(failed.progress, Some(error));
    // Terminal: a second completion attempt is a no-op.
    assert!(!JobRepo::mark_succeeded(&pool, lease).await.unwrap());
}

// ---------------------------------------------------------------------------
// Requeue
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_requeue_refuses_fresh_heartbeat(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();

    let result = JobRepo::requeue(
        &pool,
        job.id,
        &json!({"requeued": true}),
        0.0,
        RequeuePolicy::IfStale { stale_after_secs: 300.0 },
    )
    .await
    .unwrap();
    assert!(result.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_requeue_stale_job_revokes_lease(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let old_lease = job.lease().unwrap();
    age_heartbeat(&pool, job.id, 600.0).await;

    let stale = JobRepo::list_stale_running(&pool, 300.0).await.unwrap();
    assert_eq!(stale.len(), 1);

    let requeued = JobRepo::requeue(
        &pool,
        job.id,
        &json!({"requeued": true}),
        0.0,
        RequeuePolicy::IfStale { stale_after_secs: 300.0 },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(requeued.status(), Some(JobStatus::Queued));
    assert!(requeued.lease_token.is_none());

    // The former owner can no longer write.
    let snapshot = json!({"current_step": "draft_essay", "detail": "late"});
    assert!(!JobRepo::update_progress(&pool, old_lease, &snapshot).await.unwrap());

    // The job is claimable again with a new lease.
    let reclaimed = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, job.id);
    assert_ne!(reclaimed.lease_token, Some(old_lease.token));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_requeue_with_delay_is_not_immediately_claimable(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();

    let requeued = JobRepo::requeue(&pool, job.id, &json!({}), 3600.0, RequeuePolicy::Force)
        .await
        .unwrap();
    assert_matches!(requeued, Some(j) if j.next_attempt_at.is_some());
    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_requeue_ignores_non_running_job(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let id = enqueue(&pool, doc).await;

    let result = JobRepo::requeue(&pool, id, &json!({}), 0.0, RequeuePolicy::Force)
        .await
        .unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_retry_creates_linked_job(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    enqueue(&pool, doc).await;
    let job = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    JobRepo::mark_failed(&pool, job.lease().unwrap(), &json!({"error": "boom"}))
        .await
        .unwrap();

    let retry = JobRepo::retry(&pool, job.id).await.unwrap().unwrap();
    assert_ne!(retry.id, job.id);
    assert_eq!(retry.retry_of_job_id, Some(job.id));
    assert_eq!(retry.document_id, doc);
    assert_eq!(retry.status(), Some(JobStatus::Queued));

    let original = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(original.status(), Some(JobStatus::Failed));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_retry_rejects_non_failed_job(pool: PgPool) {
    let doc = seed_document(&pool, "text").await;
    let id = enqueue(&pool, doc).await;
    assert!(JobRepo::retry(&pool, id).await.unwrap().is_none());
    assert!(JobRepo::retry(&pool, 999_999).await.unwrap().is_none());
}
