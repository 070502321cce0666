//! Progress snapshots and the publisher stages use to record them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use litessay_core::types::{DbId, JobLease, Timestamp};
use litessay_db::models::status::JobStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The job is no longer owned by this lease (requeued or finished).
    #[error("Lease lost for job {job_id}")]
    LeaseLost { job_id: DbId },
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

/// The last-known state of a job, stored as JSON on the job row.
///
/// Exactly one shape is stored at a time; each write replaces the previous
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressSnapshot {
    Step {
        current_step: String,
        detail: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        running_summary: Option<String>,
    },
    Error {
        error: String,
    },
    /// Written by an operator requeue; `requeued` holds the reason.
    Requeued {
        requeued: String,
        at: Timestamp,
    },
}

impl ProgressSnapshot {
    pub fn step(step: &str, detail: impl Into<String>) -> Self {
        Self::Step {
            current_step: step.to_string(),
            detail: detail.into(),
            running_summary: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn requeued(reason: impl Into<String>) -> Self {
        Self::Requeued {
            requeued: reason.into(),
            at: Utc::now(),
        }
    }

    /// Parse a stored snapshot. Unrecognized shapes yield `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Serializing plain strings and timestamps cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Reader / writer seams
// ---------------------------------------------------------------------------

/// Persists snapshots for the lease holder.
#[async_trait]
pub trait ProgressWriter: Send + Sync {
    /// Replace the job's snapshot. Fails with [`ProgressError::LeaseLost`]
    /// when the lease no longer matches the running job.
    async fn write(&self, lease: JobLease, snapshot: &ProgressSnapshot) -> Result<(), ProgressError>;
}

/// What a progress reader sees of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgressView {
    pub status: JobStatus,
    pub progress: Option<ProgressSnapshot>,
}

#[async_trait]
pub trait ProgressReader: Send + Sync {
    /// `None` when the job does not exist.
    async fn read(&self, job_id: DbId) -> Result<Option<JobProgressView>, ProgressError>;
}

// ---------------------------------------------------------------------------
// ProgressPublisher
// ---------------------------------------------------------------------------

/// Records the current step of a running job.
#[derive(Clone)]
pub struct ProgressPublisher {
    writer: Arc<dyn ProgressWriter>,
}

impl ProgressPublisher {
    pub fn new(writer: Arc<dyn ProgressWriter>) -> Self {
        Self { writer }
    }

    pub async fn update(
        &self,
        lease: JobLease,
        step: &str,
        detail: impl Into<String>,
    ) -> Result<(), ProgressError> {
        let detail = detail.into();
        tracing::info!(job_id = lease.job_id, step, detail = %detail, "Progress");
        self.writer
            .write(lease, &ProgressSnapshot::step(step, detail))
            .await
    }

    /// Like [`update`](Self::update), also carrying the summary built so far.
    pub async fn update_with_summary(
        &self,
        lease: JobLease,
        step: &str,
        detail: impl Into<String>,
        running_summary: impl Into<String>,
    ) -> Result<(), ProgressError> {
        let detail = detail.into();
        let running_summary = running_summary.into();
        tracing::info!(
            job_id = lease.job_id,
            step,
            detail = %detail,
            summary_len = running_summary.len(),
            "Progress",
        );
        let snapshot = ProgressSnapshot::Step {
            current_step: step.to_string(),
            detail,
            running_summary: Some(running_summary),
        };
        self.writer.write(lease, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<ProgressSnapshot>>,
        revoked: bool,
    }

    #[async_trait]
    impl ProgressWriter for Recorder {
        async fn write(
            &self,
            lease: JobLease,
            snapshot: &ProgressSnapshot,
        ) -> Result<(), ProgressError> {
            if self.revoked {
                return Err(ProgressError::LeaseLost {
                    job_id: lease.job_id,
                });
            }
            self.writes.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    #[test]
    fn step_snapshot_omits_absent_summary() {
        let value = ProgressSnapshot::step("ingest", "Fetching text").to_value();
        assert_eq!(
            value,
            json!({"current_step": "ingest", "detail": "Fetching text"})
        );
    }

    #[test]
    fn stored_shapes_parse_back() {
        assert_matches!(
            ProgressSnapshot::from_value(&json!({"error": "boom"})),
            Some(ProgressSnapshot::Error { error }) if error == "boom"
        );
        assert_matches!(
            ProgressSnapshot::from_value(&json!({
                "current_step": "summarize_book",
                "detail": "Summarizing chunk 2/3",
                "running_summary": "So far..."
            })),
            Some(ProgressSnapshot::Step { running_summary: Some(_), .. })
        );
        assert_matches!(
            ProgressSnapshot::from_value(&json!({
                "requeued": "operator resume",
                "at": "2026-01-01T00:00:00Z"
            })),
            Some(ProgressSnapshot::Requeued { .. })
        );
        assert_eq!(ProgressSnapshot::from_value(&json!({})), None);
    }

    #[tokio::test]
    async fn publisher_writes_latest_snapshot() {
        let recorder = Arc::new(Recorder::default());
        let publisher = ProgressPublisher::new(recorder.clone());
        let lease = JobLease::new(1, Uuid::new_v4());

        publisher.update(lease, "ingest", "Fetching text").await.unwrap();
        publisher
            .update_with_summary(lease, "summarize_book", "chunk 1/1", "Summary")
            .await
            .unwrap();

        let writes = recorder.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_matches!(
            &writes[1],
            ProgressSnapshot::Step { running_summary: Some(s), .. } if s == "Summary"
        );
    }

    #[tokio::test]
    async fn publisher_surfaces_lease_loss() {
        let recorder = Arc::new(Recorder {
            revoked: true,
            ..Default::default()
        });
        let publisher = ProgressPublisher::new(recorder);
        let lease = JobLease::new(9, Uuid::new_v4());

        let result = publisher.update(lease, "ingest", "x").await;
        assert_matches!(result, Err(ProgressError::LeaseLost { job_id: 9 }));
    }
}
