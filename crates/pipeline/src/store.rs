//! The queue and document operations the pipeline and worker depend on.

use async_trait::async_trait;
use litessay_core::collaborators::SourceMetadata;
use litessay_core::document::JOB_TYPE_ESSAY_PIPELINE;
use litessay_core::types::{DbId, JobLease};
use litessay_db::models::artifact::{JobArtifact, NewArtifact};
use litessay_db::models::document::{CreateDocument, Document};
use litessay_db::models::job::Job;
use litessay_db::models::status::IngestStatus;
use litessay_db::repositories::{DocumentRepo, JobArtifactRepo, JobRepo, RequeuePolicy};
use litessay_db::DbPool;
use litessay_events::ProgressSnapshot;

use crate::error::PipelineError;

#[async_trait]
pub trait JobStore: Send + Sync {
    // ---- queue ----

    async fn enqueue(&self, document_id: DbId) -> Result<Job, PipelineError>;

    /// Claim the oldest due queued job. At most one caller wins each job.
    async fn claim_next(&self) -> Result<Option<Job>, PipelineError>;

    /// Renew the lease holder's heartbeat. `false` if the lease is gone.
    async fn heartbeat(&self, lease: JobLease) -> Result<bool, PipelineError>;

    /// Record `message` as the job's `{error}` snapshot and mark it failed.
    async fn mark_failed(&self, lease: JobLease, message: &str) -> Result<bool, PipelineError>;

    /// Write every artifact and mark the job succeeded, atomically.
    ///
    /// Fails with [`PipelineError::LeaseLost`] (writing nothing) if the lease
    /// no longer matches.
    async fn persist_results(
        &self,
        lease: JobLease,
        artifacts: &[NewArtifact],
    ) -> Result<(), PipelineError>;

    /// Operator resume of a running job. `None` if the job is not running
    /// or the policy refused it.
    async fn requeue(
        &self,
        job_id: DbId,
        reason: &str,
        delay_secs: f64,
        policy: RequeuePolicy,
    ) -> Result<Option<Job>, PipelineError>;

    /// New queued job for a failed job's document. `None` unless the job
    /// exists and is failed.
    async fn retry(&self, job_id: DbId) -> Result<Option<Job>, PipelineError>;

    async fn find_job(&self, job_id: DbId) -> Result<Option<Job>, PipelineError>;

    /// Running jobs whose heartbeat is older than `stale_after_secs`, oldest
    /// claim first. These are the candidates for a non-forced requeue.
    async fn list_stale_running(&self, stale_after_secs: f64) -> Result<Vec<Job>, PipelineError>;

    /// Artifacts written by the job's successful run, in insertion order.
    async fn list_artifacts(&self, job_id: DbId) -> Result<Vec<JobArtifact>, PipelineError>;

    // ---- documents ----

    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, PipelineError>;

    async fn find_document_by_hash(
        &self,
        canonical_hash: &str,
    ) -> Result<Option<Document>, PipelineError>;

    /// Insert, or return the document that already has this content hash.
    async fn insert_document(&self, input: &CreateDocument) -> Result<Document, PipelineError>;

    /// Fill in missing title/author. Existing values are kept.
    async fn backfill_metadata(
        &self,
        document_id: DbId,
        metadata: &SourceMetadata,
    ) -> Result<Document, PipelineError>;

    async fn set_ingest_status(
        &self,
        document_id: DbId,
        status: IngestStatus,
    ) -> Result<(), PipelineError>;

    async fn cache_summary(
        &self,
        document_id: DbId,
        summary: &str,
        chunk_count: usize,
    ) -> Result<(), PipelineError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, document_id: DbId) -> Result<Job, PipelineError> {
        Ok(JobRepo::enqueue(&self.pool, document_id, JOB_TYPE_ESSAY_PIPELINE).await?)
    }

    async fn claim_next(&self) -> Result<Option<Job>, PipelineError> {
        Ok(JobRepo::claim_next(&self.pool).await?)
    }

    async fn heartbeat(&self, lease: JobLease) -> Result<bool, PipelineError> {
        Ok(JobRepo::heartbeat(&self.pool, lease).await?)
    }

    async fn mark_failed(&self, lease: JobLease, message: &str) -> Result<bool, PipelineError> {
        let progress = ProgressSnapshot::error(message).to_value();
        Ok(JobRepo::mark_failed(&self.pool, lease, &progress).await?)
    }

    async fn persist_results(
        &self,
        lease: JobLease,
        artifacts: &[NewArtifact],
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await?;
        for artifact in artifacts {
            JobArtifactRepo::insert(&mut *tx, lease.job_id, artifact).await?;
        }
        if !JobRepo::mark_succeeded(&mut *tx, lease).await? {
            tx.rollback().await?;
            return Err(PipelineError::LeaseLost {
                job_id: lease.job_id,
            });
        }
        tx.commit().await?;
        Ok(())
    }

    async fn requeue(
        &self,
        job_id: DbId,
        reason: &str,
        delay_secs: f64,
        policy: RequeuePolicy,
    ) -> Result<Option<Job>, PipelineError> {
        let progress = ProgressSnapshot::requeued(reason).to_value();
        Ok(JobRepo::requeue(&self.pool, job_id, &progress, delay_secs, policy).await?)
    }

    async fn retry(&self, job_id: DbId) -> Result<Option<Job>, PipelineError> {
        Ok(JobRepo::retry(&self.pool, job_id).await?)
    }

    async fn find_job(&self, job_id: DbId) -> Result<Option<Job>, PipelineError> {
        Ok(JobRepo::find_by_id(&self.pool, job_id).await?)
    }

    async fn list_stale_running(&self, stale_after_secs: f64) -> Result<Vec<Job>, PipelineError> {
        Ok(JobRepo::list_stale_running(&self.pool, stale_after_secs).await?)
    }

    async fn list_artifacts(&self, job_id: DbId) -> Result<Vec<JobArtifact>, PipelineError> {
        Ok(JobArtifactRepo::list_for_job(&self.pool, job_id).await?)
    }

    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, PipelineError> {
        Ok(DocumentRepo::find_by_id(&self.pool, document_id).await?)
    }

    async fn find_document_by_hash(
        &self,
        canonical_hash: &str,
    ) -> Result<Option<Document>, PipelineError> {
        Ok(DocumentRepo::find_by_hash(&self.pool, canonical_hash).await?)
    }

    async fn insert_document(&self, input: &CreateDocument) -> Result<Document, PipelineError> {
        Ok(DocumentRepo::insert_or_get(&self.pool, input).await?)
    }

    async fn backfill_metadata(
        &self,
        document_id: DbId,
        metadata: &SourceMetadata,
    ) -> Result<Document, PipelineError> {
        DocumentRepo::backfill_metadata(
            &self.pool,
            document_id,
            metadata.title.as_deref(),
            metadata.author.as_deref(),
        )
        .await?
        .ok_or(PipelineError::DocumentNotFound { document_id })
    }

    async fn set_ingest_status(
        &self,
        document_id: DbId,
        status: IngestStatus,
    ) -> Result<(), PipelineError> {
        if !DocumentRepo::set_ingest_status(&self.pool, document_id, status).await? {
            return Err(PipelineError::DocumentNotFound { document_id });
        }
        Ok(())
    }

    async fn cache_summary(
        &self,
        document_id: DbId,
        summary: &str,
        chunk_count: usize,
    ) -> Result<(), PipelineError> {
        let chunk_count = i32::try_from(chunk_count).unwrap_or(i32::MAX);
        if !DocumentRepo::cache_summary(&self.pool, document_id, summary, chunk_count).await? {
            return Err(PipelineError::DocumentNotFound { document_id });
        }
        Ok(())
    }
}
