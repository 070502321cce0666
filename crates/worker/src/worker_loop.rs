//! The claim / run / record loop.
//!
//! One job is in flight per worker. Cancellation is observed between jobs,
//! so a job that has started is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use litessay_core::types::{DbId, JobLease};
use litessay_pipeline::{JobStore, PipelineEngine, PipelineError, RunReport, StageContext};
use tokio_util::sync::CancellationToken;

use crate::heartbeat::spawn_heartbeat;

/// What one pass of the loop did.
#[derive(Debug)]
pub enum JobOutcome {
    /// Nothing was claimed (empty queue or a store error).
    Idle,
    Succeeded { job_id: DbId, report: RunReport },
    /// The run failed and the error was recorded on the job.
    Failed { job_id: DbId, message: String },
    /// The job was requeued out from under this worker; nothing recorded.
    LeaseLost { job_id: DbId },
}

pub struct WorkerLoop {
    store: Arc<dyn JobStore>,
    engine: PipelineEngine,
    poll_interval: Duration,
    heartbeat_interval: Duration,
}

impl WorkerLoop {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: PipelineEngine,
        poll_interval: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            poll_interval,
            heartbeat_interval,
        }
    }

    /// Run until `cancel` is triggered. Sleeps `poll_interval` whenever the
    /// queue is empty.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            heartbeat_interval_ms = self.heartbeat_interval.as_millis() as u64,
            "Worker started",
        );

        while !cancel.is_cancelled() {
            if let JobOutcome::Idle = self.run_once().await {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    /// Claim and run at most one job.
    pub async fn run_once(&self) -> JobOutcome {
        let job = match self.store.claim_next().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!("No queued jobs");
                return JobOutcome::Idle;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim a job");
                return JobOutcome::Idle;
            }
        };
        let Some(lease) = job.lease() else {
            tracing::error!(job_id = job.id, "Claimed job carries no lease");
            return JobOutcome::Idle;
        };

        tracing::info!(job_id = job.id, document_id = job.document_id, "Claimed job");

        match self.process_job(lease, job.document_id).await {
            Ok(report) => {
                tracing::info!(
                    job_id = job.id,
                    revisions = report.revisions,
                    forced_acceptance = report.forced_acceptance,
                    "Job succeeded",
                );
                JobOutcome::Succeeded {
                    job_id: job.id,
                    report,
                }
            }
            Err(PipelineError::LeaseLost { job_id }) => {
                tracing::warn!(job_id, "Job was requeued while running, abandoning it");
                JobOutcome::LeaseLost { job_id }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    job_id = job.id,
                    error = %message,
                    data_integrity = e.is_data_integrity(),
                    "Job failed",
                );
                match self.store.mark_failed(lease, &message).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(job_id = job.id, "Lease lost before failure could be recorded");
                    }
                    Err(e) => {
                        tracing::error!(job_id = job.id, error = %e, "Failed to record job failure");
                    }
                }
                JobOutcome::Failed {
                    job_id: job.id,
                    message,
                }
            }
        }
    }

    async fn process_job(&self, lease: JobLease, document_id: DbId) -> Result<RunReport, PipelineError> {
        let _heartbeat = spawn_heartbeat(Arc::clone(&self.store), lease, self.heartbeat_interval);

        let document = self
            .store
            .load_document(document_id)
            .await?
            .ok_or(PipelineError::DocumentNotFound { document_id })?;
        let mut ctx = StageContext::new(lease, &document);
        self.engine.run(&mut ctx).await
    }
}
