//! Job entity: one run of the essay pipeline.

use litessay_core::types::{DbId, JobLease, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub document_id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    /// Last-known structured progress snapshot.
    pub progress: Option<serde_json::Value>,
    /// Jobs are not claimable before this instant.
    pub next_attempt_at: Option<Timestamp>,
    /// Ownership token of the worker currently running the job.
    #[serde(skip_serializing)]
    pub lease_token: Option<Uuid>,
    pub heartbeat_at: Option<Timestamp>,
    pub retry_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }

    /// The ownership lease, present only while the job is running.
    pub fn lease(&self) -> Option<JobLease> {
        self.lease_token.map(|token| JobLease::new(self.id, token))
    }
}
