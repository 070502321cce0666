//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for every status literal. Writes
//! made by the owning worker are guarded by its lease token; a guarded write
//! that matches no row means the caller no longer owns the job.
//!
//! Status changes are enforced by each statement's `WHERE status_id = ...`
//! clause and follow the edges of `litessay_core::scheduling::state_machine`
//! (see [`JobStatus::can_transition_to`]): `claim_next` queued -> running,
//! `mark_succeeded` / `mark_failed` running -> terminal, `requeue`
//! running -> queued. `retry` never moves a failed job; it inserts a new one.

use litessay_core::types::{DbId, JobLease};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::job::Job;
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, document_id, job_type, status_id, progress, next_attempt_at, \
    lease_token, heartbeat_at, retry_of_job_id, \
    created_at, started_at, finished_at";

/// Whether an operator requeue should check the owner's heartbeat first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequeuePolicy {
    /// Only requeue when the heartbeat is older than this many seconds
    /// (or was never recorded).
    IfStale { stale_after_secs: f64 },
    /// Requeue regardless of heartbeat. The former owner, if alive, will
    /// lose its lease at its next write.
    Force,
}

/// Provides queue operations for pipeline jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new queued job. Returns immediately with the job row.
    pub async fn enqueue(
        pool: &PgPool,
        document_id: DbId,
        job_type: &str,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (document_id, job_type, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(document_id)
            .bind(job_type)
            .bind(JobStatus::Queued.id())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest due queued job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent pollers never wait
    /// on each other: a row locked by another claimer is skipped and, if no
    /// other row is due, the caller simply gets `None`. The winner receives
    /// the row with a fresh lease token, `started_at` and `heartbeat_at`.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, started_at = NOW(), heartbeat_at = NOW(), \
                 lease_token = $2, next_attempt_at = NULL \
             WHERE status_id = $3 AND id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $3 \
                   AND (next_attempt_at IS NULL OR next_attempt_at <= NOW()) \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Running.id())
            .bind(Uuid::new_v4())
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the progress snapshot of a running job.
    ///
    /// Returns `false` if the lease no longer matches.
    pub async fn update_progress(
        pool: &PgPool,
        lease: JobLease,
        progress: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET progress = $3 \
             WHERE id = $1 AND lease_token = $2 AND status_id = $4",
        )
        .bind(lease.job_id)
        .bind(lease.token)
        .bind(progress)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Renew the owner's heartbeat. Returns `false` if the lease is gone.
    pub async fn heartbeat(pool: &PgPool, lease: JobLease) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET heartbeat_at = NOW() \
             WHERE id = $1 AND lease_token = $2 AND status_id = $3",
        )
        .bind(lease.job_id)
        .bind(lease.token)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a running job as succeeded.
    ///
    /// Accepts any executor so it can share a transaction with the
    /// artifact inserts.
    pub async fn mark_succeeded<'e, E>(executor: E, lease: JobLease) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $3, finished_at = NOW(), lease_token = NULL \
             WHERE id = $1 AND lease_token = $2 AND status_id = $4",
        )
        .bind(lease.job_id)
        .bind(lease.token)
        .bind(JobStatus::Succeeded.id())
        .bind(JobStatus::Running.id())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a running job as failed, storing `progress` (an `{error}`
    /// snapshot) in place of the last progress update.
    ///
    /// No automatic retry is performed. The job stays failed until an
    /// operator creates a retry via [`JobRepo::retry`].
    pub async fn mark_failed(
        pool: &PgPool,
        lease: JobLease,
        progress: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $3, finished_at = NOW(), progress = $5, lease_token = NULL \
             WHERE id = $1 AND lease_token = $2 AND status_id = $4",
        )
        .bind(lease.job_id)
        .bind(lease.token)
        .bind(JobStatus::Failed.id())
        .bind(JobStatus::Running.id())
        .bind(progress)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Operator resume: move a running job back to queued.
    ///
    /// The job becomes claimable after `delay_secs`. The lease is cleared so
    /// that a still-alive former owner cannot write to the job again.
    /// Returns `None` if the job is not running or, under
    /// [`RequeuePolicy::IfStale`], if its heartbeat is still fresh.
    pub async fn requeue(
        pool: &PgPool,
        job_id: DbId,
        progress: &serde_json::Value,
        delay_secs: f64,
        policy: RequeuePolicy,
    ) -> Result<Option<Job>, sqlx::Error> {
        let stale_after_secs = match policy {
            RequeuePolicy::IfStale { stale_after_secs } => Some(stale_after_secs),
            RequeuePolicy::Force => None,
        };

        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, \
                 next_attempt_at = NOW() + make_interval(secs => $3), \
                 progress = $4, lease_token = NULL, heartbeat_at = NULL \
             WHERE id = $1 AND status_id = $5 \
               AND ($6::DOUBLE PRECISION IS NULL \
                    OR heartbeat_at IS NULL \
                    OR heartbeat_at < NOW() - make_interval(secs => $6::DOUBLE PRECISION)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(JobStatus::Queued.id())
            .bind(delay_secs)
            .bind(progress)
            .bind(JobStatus::Running.id())
            .bind(stale_after_secs)
            .fetch_optional(pool)
            .await
    }

    /// Create a new queued job for a failed job's document.
    ///
    /// The new job has `retry_of_job_id` pointing to the original, which
    /// stays failed. Returns `None` if the job does not exist or is not
    /// failed.
    pub async fn retry(pool: &PgPool, job_id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (document_id, job_type, status_id, retry_of_job_id) \
             SELECT document_id, job_type, $2, id FROM jobs \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Failed.id())
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Running jobs whose heartbeat is older than `stale_after_secs`.
    pub async fn list_stale_running(
        pool: &PgPool,
        stale_after_secs: f64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 \
               AND (heartbeat_at IS NULL \
                    OR heartbeat_at < NOW() - make_interval(secs => $2)) \
             ORDER BY started_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Running.id())
            .bind(stale_after_secs)
            .fetch_all(pool)
            .await
    }
}
