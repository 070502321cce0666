use litessay_core::error::{CollaboratorError, CoreError};
use litessay_core::types::DbId;
use litessay_events::ProgressError;

/// Errors that end a pipeline run.
///
/// Every variant is fatal to the current run. The worker records the
/// message on the job, except for [`PipelineError::LeaseLost`] where the job
/// no longer belongs to it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An external service failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A stage ran without an input an earlier stage should have produced.
    #[error("Stage {stage} is missing required input: {field}")]
    MissingInput {
        stage: &'static str,
        field: &'static str,
    },

    #[error("Document {document_id} not found")]
    DocumentNotFound { document_id: DbId },

    /// The job was requeued (or finished) by someone else mid-run.
    #[error("Lease lost for job {job_id}")]
    LeaseLost { job_id: DbId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ProgressError> for PipelineError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Database(e) => Self::Database(e),
            ProgressError::LeaseLost { job_id } => Self::LeaseLost { job_id },
        }
    }
}

impl PipelineError {
    /// Data-integrity failures point at a bug or a corrupted row rather
    /// than a flaky dependency.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::MissingInput { .. } | Self::DocumentNotFound { .. }
        )
    }
}
