//! Read-only job views for operators: status, results and stale jobs.

use litessay_core::types::{DbId, Timestamp};
use litessay_db::models::artifact::{ArtifactType, JobArtifact};
use litessay_db::models::job::Job;
use litessay_db::models::status::JobStatus;
use litessay_pipeline::{JobStore, PipelineError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Job {0} not found")]
    JobNotFound(DbId),

    #[error("Job {job_id} is not complete (status: {status})")]
    NotComplete { job_id: DbId, status: String },

    #[error(transparent)]
    Store(#[from] PipelineError),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job_id: DbId,
    pub document_id: DbId,
    pub job_type: String,
    pub status: String,
    pub progress: Option<Value>,
    pub retry_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub heartbeat_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl From<Job> for JobStatusReport {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            document_id: job.document_id,
            status: status_label(&job),
            job_type: job.job_type,
            progress: job.progress,
            retry_of_job_id: job.retry_of_job_id,
            created_at: job.created_at,
            started_at: job.started_at,
            heartbeat_at: job.heartbeat_at,
            finished_at: job.finished_at,
        }
    }
}

/// The outputs of a succeeded job. Missing artifacts read as empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: DbId,
    pub themes: Vec<String>,
    pub evidence: Value,
    pub essay_markdown: String,
    pub book_summary: String,
}

impl JobResult {
    fn from_artifacts(job_id: DbId, artifacts: Vec<JobArtifact>) -> Self {
        let mut result = Self {
            job_id,
            themes: Vec::new(),
            evidence: Value::Object(Default::default()),
            essay_markdown: String::new(),
            book_summary: String::new(),
        };
        for artifact in artifacts {
            let Ok(kind) = artifact.artifact_type.parse::<ArtifactType>() else {
                tracing::warn!(job_id, artifact_type = %artifact.artifact_type, "Unknown artifact type");
                continue;
            };
            match (kind, artifact.blob_json, artifact.blob_text) {
                (ArtifactType::ThemesJson, Some(json), _) => {
                    result.themes = json
                        .get("themes")
                        .and_then(Value::as_array)
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                }
                (ArtifactType::EvidenceJson, Some(json), _) => result.evidence = json,
                (ArtifactType::EssayMd, _, Some(text)) => result.essay_markdown = text,
                (ArtifactType::SummaryMd, _, Some(text)) => result.book_summary = text,
                _ => {}
            }
        }
        result
    }
}

pub async fn job_status(store: &dyn JobStore, job_id: DbId) -> Result<JobStatusReport, ReportError> {
    let job = store
        .find_job(job_id)
        .await?
        .ok_or(ReportError::JobNotFound(job_id))?;
    Ok(job.into())
}

/// Results of a succeeded job; any other status is [`ReportError::NotComplete`].
pub async fn job_result(store: &dyn JobStore, job_id: DbId) -> Result<JobResult, ReportError> {
    let job = store
        .find_job(job_id)
        .await?
        .ok_or(ReportError::JobNotFound(job_id))?;
    if job.status() != Some(JobStatus::Succeeded) {
        return Err(ReportError::NotComplete {
            job_id,
            status: status_label(&job),
        });
    }
    let artifacts = store.list_artifacts(job_id).await?;
    Ok(JobResult::from_artifacts(job_id, artifacts))
}

pub async fn stale_jobs(
    store: &dyn JobStore,
    stale_after_secs: f64,
) -> Result<Vec<JobStatusReport>, ReportError> {
    let jobs = store.list_stale_running(stale_after_secs).await?;
    Ok(jobs.into_iter().map(JobStatusReport::from).collect())
}

fn status_label(job: &Job) -> String {
    job.status()
        .map_or_else(|| format!("unknown ({})", job.status_id), |s| s.to_string())
}
