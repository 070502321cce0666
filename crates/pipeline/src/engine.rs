//! The pipeline state machine.
//!
//! Stages run in a fixed order. The only branch is after review, where the
//! [`RevisionController`] chooses between persisting and another revision.

use std::sync::Arc;

use litessay_core::collaborators::{EmbeddingModel, LanguageModel, TextSource, VectorIndex};
use litessay_core::config::PipelineConfig;
use litessay_core::job_events::{
    STEP_DISCOVER_THEMES, STEP_DRAFT_ESSAY, STEP_EXPAND_CONTEXT, STEP_INGEST,
    STEP_PERSIST_RESULTS, STEP_RETRIEVE_EVIDENCE, STEP_REVIEW_ESSAY, STEP_REVISE_ESSAY,
    STEP_SUMMARIZE_BOOK, STEP_WRITE_THEME_INTROS,
};
use litessay_events::ProgressPublisher;

use crate::context::StageContext;
use crate::error::PipelineError;
use crate::revision::{ReviewDecision, RevisionController};
use crate::stages;
use crate::store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    SummarizeBook,
    DiscoverThemes,
    RetrieveEvidence,
    ExpandContext,
    WriteThemeIntros,
    DraftEssay,
    ReviewEssay,
    ReviseEssay,
    PersistResults,
}

impl Stage {
    pub const FIRST: Stage = Stage::Ingest;

    /// Progress step name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => STEP_INGEST,
            Self::SummarizeBook => STEP_SUMMARIZE_BOOK,
            Self::DiscoverThemes => STEP_DISCOVER_THEMES,
            Self::RetrieveEvidence => STEP_RETRIEVE_EVIDENCE,
            Self::ExpandContext => STEP_EXPAND_CONTEXT,
            Self::WriteThemeIntros => STEP_WRITE_THEME_INTROS,
            Self::DraftEssay => STEP_DRAFT_ESSAY,
            Self::ReviewEssay => STEP_REVIEW_ESSAY,
            Self::ReviseEssay => STEP_REVISE_ESSAY,
            Self::PersistResults => STEP_PERSIST_RESULTS,
        }
    }

    /// The stage after this one. `decision` is only consulted after review;
    /// a review without a decision counts as not approved. `None` ends the
    /// run.
    pub fn next(self, decision: Option<ReviewDecision>) -> Option<Stage> {
        match self {
            Self::Ingest => Some(Self::SummarizeBook),
            Self::SummarizeBook => Some(Self::DiscoverThemes),
            Self::DiscoverThemes => Some(Self::RetrieveEvidence),
            Self::RetrieveEvidence => Some(Self::ExpandContext),
            Self::ExpandContext => Some(Self::WriteThemeIntros),
            Self::WriteThemeIntros => Some(Self::DraftEssay),
            Self::DraftEssay => Some(Self::ReviewEssay),
            Self::ReviewEssay => match decision {
                Some(d) if d.proceeds_to_persist() => Some(Self::PersistResults),
                _ => Some(Self::ReviseEssay),
            },
            Self::ReviseEssay => Some(Self::ReviewEssay),
            Self::PersistResults => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The external services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub text_source: Arc<dyn TextSource>,
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub index: Arc<dyn VectorIndex>,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Every stage executed, in order, including repeated review/revise.
    pub stages: Vec<Stage>,
    pub revisions: u32,
    /// The essay was persisted without reviewer approval.
    pub forced_acceptance: bool,
}

pub struct PipelineEngine {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) progress: ProgressPublisher,
    pub(crate) collaborators: Collaborators,
    pub(crate) config: PipelineConfig,
    revision: RevisionController,
}

impl PipelineEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        progress: ProgressPublisher,
        collaborators: Collaborators,
        config: PipelineConfig,
    ) -> Self {
        let revision = RevisionController::new(config.max_revisions);
        Self {
            store,
            progress,
            collaborators,
            config,
            revision,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for the job in `ctx`, from ingestion through
    /// persistence. The first stage error ends the run.
    pub async fn run(&self, ctx: &mut StageContext) -> Result<RunReport, PipelineError> {
        let mut executed = Vec::new();
        let mut forced_acceptance = false;
        let mut stage = Some(Stage::FIRST);

        while let Some(current) = stage {
            tracing::debug!(job_id = ctx.job_id(), stage = %current, "Stage starting");
            executed.push(current);

            let decision = match current {
                Stage::Ingest => stages::ingest::run(self, ctx).await.map(|_| None),
                Stage::SummarizeBook => stages::summarize::run(self, ctx).await.map(|_| None),
                Stage::DiscoverThemes => stages::themes::run(self, ctx).await.map(|_| None),
                Stage::RetrieveEvidence => {
                    stages::evidence::retrieve(self, ctx).await.map(|_| None)
                }
                Stage::ExpandContext => stages::evidence::expand(self, ctx).await.map(|_| None),
                Stage::WriteThemeIntros => stages::intros::run(self, ctx).await.map(|_| None),
                Stage::DraftEssay => stages::draft::draft(self, ctx).await.map(|_| None),
                Stage::ReviewEssay => stages::review::run(self, ctx)
                    .await
                    .map(|approved| Some(self.revision.decide(approved, ctx.revision_count))),
                Stage::ReviseEssay => stages::draft::revise(self, ctx).await.map(|_| None),
                Stage::PersistResults => stages::persist::run(self, ctx).await.map(|_| None),
            }
            .inspect_err(|e| {
                tracing::error!(
                    job_id = ctx.job_id(),
                    stage = %current,
                    error = %e,
                    "Stage failed",
                );
            })?;

            if decision == Some(ReviewDecision::ForceAccept) {
                forced_acceptance = true;
                tracing::warn!(
                    job_id = ctx.job_id(),
                    revisions = ctx.revision_count,
                    max_revisions = self.revision.max_revisions(),
                    "Revision budget spent, persisting unapproved essay",
                );
            }

            stage = current.next(decision);
        }

        tracing::info!(
            job_id = ctx.job_id(),
            stages = executed.len(),
            revisions = ctx.revision_count,
            forced_acceptance,
            "Pipeline run complete",
        );

        Ok(RunReport {
            stages: executed,
            revisions: ctx.revision_count,
            forced_acceptance,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use litessay_db::models::artifact::{ArtifactPayload, ArtifactType};
    use litessay_db::models::status::{IngestStatus, JobStatus};
    use litessay_events::ProgressSnapshot;
    use serde_json::json;

    use super::*;
    use crate::prompts;
    use crate::testing::{Harness, APPROVE, REJECT};

    const THREE_PARAGRAPHS: &str = "The storm rose over the moor.\n\n\
        Fate brought the travellers together.\n\n\
        By morning the house was silent.";

    #[test]
    fn linear_transitions_follow_fixed_order() {
        let mut stage = Stage::FIRST;
        let mut order = vec![stage];
        while let Some(next) = stage.next(Some(ReviewDecision::Accept)) {
            order.push(next);
            stage = next;
        }
        assert_eq!(
            order,
            [
                Stage::Ingest,
                Stage::SummarizeBook,
                Stage::DiscoverThemes,
                Stage::RetrieveEvidence,
                Stage::ExpandContext,
                Stage::WriteThemeIntros,
                Stage::DraftEssay,
                Stage::ReviewEssay,
                Stage::PersistResults,
            ]
        );
    }

    #[test]
    fn review_branches_on_decision() {
        assert_eq!(
            Stage::ReviewEssay.next(Some(ReviewDecision::ForceAccept)),
            Some(Stage::PersistResults)
        );
        assert_eq!(
            Stage::ReviewEssay.next(Some(ReviewDecision::Revise)),
            Some(Stage::ReviseEssay)
        );
        assert_eq!(Stage::ReviseEssay.next(None), Some(Stage::ReviewEssay));
    }

    #[tokio::test]
    async fn approved_run_persists_all_artifacts() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        let mut config = PipelineConfig::default();
        config.top_k_evidence = 1;
        let engine = harness.engine(config);
        let mut ctx = harness.claim_context().await;

        let report = engine.run(&mut ctx).await.unwrap();
        assert_eq!(report.revisions, 0);
        assert!(!report.forced_acceptance);
        assert_eq!(report.stages.last(), Some(&Stage::PersistResults));

        let evidence = ctx.evidence.as_ref().unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence["fate"].len(), 1);

        let artifacts = harness.store.artifacts(ctx.job_id());
        let kinds: Vec<_> = artifacts.iter().map(|a| a.artifact_type).collect();
        assert_eq!(
            kinds,
            [
                ArtifactType::ThemesJson,
                ArtifactType::EvidenceJson,
                ArtifactType::EssayMd,
                ArtifactType::SummaryMd,
            ]
        );
        assert_eq!(artifacts[0].payload, ArtifactPayload::Json(json!({"themes": ["fate"]})));
        assert_eq!(harness.store.job_status(ctx.job_id()), Some(JobStatus::Succeeded));
        assert_eq!(
            harness.store.document_ingest_status(ctx.document_id),
            Some(IngestStatus::Ready)
        );
    }

    #[tokio::test]
    async fn persistent_rejection_forces_acceptance_after_two_revisions() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate", "silence"]"#, &[REJECT]);
        let engine = harness.engine(PipelineConfig::default());
        let mut ctx = harness.claim_context().await;

        let report = engine.run(&mut ctx).await.unwrap();
        assert_eq!(report.revisions, 2);
        assert!(report.forced_acceptance);

        let reviews = report
            .stages
            .iter()
            .filter(|s| **s == Stage::ReviewEssay)
            .count();
        let revisions = report
            .stages
            .iter()
            .filter(|s| **s == Stage::ReviseEssay)
            .count();
        assert_eq!(reviews, 3);
        assert_eq!(revisions, 2);
        assert_eq!(harness.llm.calls_with_system(prompts::REVISE_SYSTEM), 2);
        assert_eq!(harness.store.job_status(ctx.job_id()), Some(JobStatus::Succeeded));
    }

    #[tokio::test]
    async fn approval_after_one_revision_stops_the_loop() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[REJECT, APPROVE]);
        let engine = harness.engine(PipelineConfig::default());
        let mut ctx = harness.claim_context().await;

        let report = engine.run(&mut ctx).await.unwrap();
        assert_eq!(report.revisions, 1);
        assert!(!report.forced_acceptance);
    }

    #[tokio::test]
    async fn ready_document_is_not_reembedded() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        let engine = harness.engine(PipelineConfig::default());

        let mut first = harness.claim_context().await;
        engine.run(&mut first).await.unwrap();
        assert_eq!(harness.index.upsert_calls(), 1);

        let mut second = harness.claim_context().await;
        engine.run(&mut second).await.unwrap();
        assert_eq!(harness.index.upsert_calls(), 1);
        assert_eq!(harness.index.ensure_calls(), 1);
        assert_eq!(second.segments, first.segments);
        assert_eq!(harness.source.fetches(), 2);
    }

    #[tokio::test]
    async fn cached_summary_is_reused() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        let engine = harness.engine(PipelineConfig::default());

        let mut first = harness.claim_context().await;
        engine.run(&mut first).await.unwrap();
        let summary_calls = harness.llm.calls_with_system(prompts::SUMMARIZE_CHUNK_SYSTEM);
        assert_eq!(summary_calls, 1);

        let mut second = harness.claim_context().await;
        engine.run(&mut second).await.unwrap();
        assert_eq!(
            harness.llm.calls_with_system(prompts::SUMMARIZE_CHUNK_SYSTEM),
            summary_calls
        );
        assert_eq!(second.book_summary, first.book_summary);
    }

    #[tokio::test]
    async fn summary_windows_are_folded_in_order() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        let mut config = PipelineConfig::default();
        config.summary_chunk_size = 2;
        let engine = harness.engine(config);
        let mut ctx = harness.claim_context().await;

        engine.run(&mut ctx).await.unwrap();
        assert_eq!(harness.llm.calls_with_system(prompts::SUMMARIZE_CHUNK_SYSTEM), 2);
        let summary = ctx.book_summary.as_deref().unwrap();
        assert_eq!(summary.split("\n\n").count(), 2);

        let details: Vec<_> = harness
            .store
            .progress_history(ctx.job_id())
            .into_iter()
            .filter_map(|s| match s {
                ProgressSnapshot::Step {
                    current_step,
                    detail,
                    ..
                } if current_step == STEP_SUMMARIZE_BOOK => Some(detail),
                _ => None,
            })
            .collect();
        assert!(details.contains(&"Summarizing chunk 1/2".to_string()));
        assert!(details.contains(&"Summarizing chunk 2/2".to_string()));
    }

    #[tokio::test]
    async fn empty_text_skips_summary_artifact() {
        let harness = Harness::new("", r#"["fate"]"#, &[APPROVE]);
        let engine = harness.engine(PipelineConfig::default());
        let mut ctx = harness.claim_context().await;

        engine.run(&mut ctx).await.unwrap();
        let kinds: Vec<_> = harness
            .store
            .artifacts(ctx.job_id())
            .iter()
            .map(|a| a.artifact_type)
            .collect();
        assert!(!kinds.contains(&ArtifactType::SummaryMd));
        assert_eq!(harness.index.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn requeued_job_aborts_with_lease_lost() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        let engine = harness.engine(PipelineConfig::default());
        let mut ctx = harness.claim_context().await;

        harness.store.revoke_lease(ctx.job_id());
        let result = engine.run(&mut ctx).await;
        assert_matches!(result, Err(PipelineError::LeaseLost { job_id }) if job_id == ctx.job_id());
        assert!(harness.store.artifacts(ctx.job_id()).is_empty());
    }

    #[tokio::test]
    async fn collaborator_failure_ends_the_run() {
        let harness = Harness::new(THREE_PARAGRAPHS, r#"["fate"]"#, &[APPROVE]);
        harness.source.fail_next_fetch();
        let engine = harness.engine(PipelineConfig::default());
        let mut ctx = harness.claim_context().await;

        let result = engine.run(&mut ctx).await;
        assert_matches!(result, Err(PipelineError::Collaborator(_)));
        assert!(harness.store.artifacts(ctx.job_id()).is_empty());
    }
}
