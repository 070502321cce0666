//! Repository for the `job_artifacts` table.
//!
//! Artifacts are append-only: there is no update path. The unique index on
//! `(job_id, artifact_type)` rejects a second artifact of the same type.

use litessay_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::artifact::{ArtifactPayload, JobArtifact, NewArtifact};

/// Column list for `job_artifacts` queries.
const COLUMNS: &str = "id, job_id, artifact_type, blob_json, blob_text, created_at";

pub struct JobArtifactRepo;

impl JobArtifactRepo {
    /// Insert one artifact. Accepts any executor so a run's artifacts can be
    /// written in the same transaction that marks the job succeeded.
    pub async fn insert<'e, E>(
        executor: E,
        job_id: DbId,
        artifact: &NewArtifact,
    ) -> Result<JobArtifact, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (blob_json, blob_text) = match &artifact.payload {
            ArtifactPayload::Json(value) => (Some(value), None),
            ArtifactPayload::Text(text) => (None, Some(text.as_str())),
        };

        let query = format!(
            "INSERT INTO job_artifacts (job_id, artifact_type, blob_json, blob_text) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobArtifact>(&query)
            .bind(job_id)
            .bind(artifact.artifact_type.as_str())
            .bind(blob_json)
            .bind(blob_text)
            .fetch_one(executor)
            .await
    }

    /// All artifacts of a job, in insertion order.
    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<JobArtifact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_artifacts WHERE job_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, JobArtifact>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
