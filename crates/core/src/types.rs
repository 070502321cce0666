use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Proof of ownership over a running job.
///
/// The token is stamped on the job row when it is claimed and cleared when
/// an operator requeues it. Every write an owner makes to its job is guarded
/// by the token, so a former owner cannot clobber a job that has since been
/// handed to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobLease {
    pub job_id: DbId,
    pub token: Uuid,
}

impl JobLease {
    pub fn new(job_id: DbId, token: Uuid) -> Self {
        Self { job_id, token }
    }
}
