//! Postgres-backed progress reader/writer.

use async_trait::async_trait;
use litessay_core::types::{DbId, JobLease};
use litessay_db::models::status::JobStatus;
use litessay_db::repositories::JobRepo;
use litessay_db::DbPool;

use crate::progress::{
    JobProgressView, ProgressError, ProgressReader, ProgressSnapshot, ProgressWriter,
};

#[derive(Clone)]
pub struct PgProgressStore {
    pool: DbPool,
}

impl PgProgressStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressWriter for PgProgressStore {
    async fn write(&self, lease: JobLease, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        let updated = JobRepo::update_progress(&self.pool, lease, &snapshot.to_value()).await?;
        if !updated {
            return Err(ProgressError::LeaseLost {
                job_id: lease.job_id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressReader for PgProgressStore {
    async fn read(&self, job_id: DbId) -> Result<Option<JobProgressView>, ProgressError> {
        let Some(job) = JobRepo::find_by_id(&self.pool, job_id).await? else {
            return Ok(None);
        };
        let Some(status) = JobStatus::from_id(job.status_id) else {
            tracing::warn!(job_id, status_id = job.status_id, "Unknown job status");
            return Ok(None);
        };
        Ok(Some(JobProgressView {
            status,
            progress: job.progress.as_ref().and_then(ProgressSnapshot::from_value),
        }))
    }
}
