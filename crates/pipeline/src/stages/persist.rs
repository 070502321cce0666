use litessay_core::job_events::STEP_PERSIST_RESULTS;
use litessay_db::models::artifact::{ArtifactType, NewArtifact};
use serde_json::json;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;

/// Store the run's artifacts and mark the job succeeded in one step.
pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_PERSIST_RESULTS;
    let artifacts = build_artifacts(ctx)?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Saving results")
        .await?;
    engine.store.persist_results(ctx.lease, &artifacts).await?;

    tracing::info!(
        job_id = ctx.job_id(),
        artifacts = artifacts.len(),
        "Results persisted",
    );
    Ok(())
}

fn build_artifacts(ctx: &StageContext) -> Result<Vec<NewArtifact>, PipelineError> {
    const STAGE: &str = STEP_PERSIST_RESULTS;
    let themes = ctx.require_themes(STAGE)?;
    let evidence = ctx.require_evidence(STAGE)?;
    let essay = ctx.require_essay(STAGE)?;

    let mut artifacts = vec![
        NewArtifact::json(ArtifactType::ThemesJson, json!({ "themes": themes })),
        NewArtifact::json(ArtifactType::EvidenceJson, serde_json::to_value(evidence)?),
        NewArtifact::text(ArtifactType::EssayMd, essay),
    ];
    if let Some(summary) = ctx.book_summary.as_deref().filter(|s| !s.is_empty()) {
        artifacts.push(NewArtifact::text(ArtifactType::SummaryMd, summary));
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use litessay_core::types::JobLease;
    use litessay_db::models::artifact::ArtifactPayload;
    use litessay_db::models::document::Document;
    use litessay_db::models::status::IngestStatus;
    use uuid::Uuid;

    use super::*;
    use crate::evidence::{EvidenceItem, EvidenceMap};

    fn context() -> StageContext {
        let document = Document {
            id: 1,
            source_type: "gutenberg".into(),
            source_ref: "84".into(),
            canonical_hash: "cd".repeat(32),
            title: Some("Frankenstein".into()),
            author: Some("Mary Shelley".into()),
            summary: None,
            summary_chunk_count: 0,
            ingest_status_id: IngestStatus::Ready.id(),
            vector_namespace: "gb:84:cdcdcdcd".into(),
            created_at: Utc::now(),
        };
        let mut ctx = StageContext::new(JobLease::new(5, Uuid::new_v4()), &document);
        let mut evidence = EvidenceMap::new();
        evidence.insert(
            "creation".into(),
            vec![EvidenceItem {
                segment_id: "p00012".into(),
                score: 0.8,
                text: "It was on a dreary night of November.".into(),
                chapter: Some("Chapter 5".into()),
                paragraph_index: 12,
            }],
        );
        ctx.themes = Some(vec!["creation".into()]);
        ctx.evidence = Some(evidence);
        ctx.essay = Some("# Essay".into());
        ctx
    }

    #[test]
    fn empty_summary_is_not_persisted() {
        let mut ctx = context();
        ctx.book_summary = Some(String::new());
        let artifacts = build_artifacts(&ctx).unwrap();
        assert_eq!(artifacts.len(), 3);

        ctx.book_summary = Some("A scientist builds a creature.".into());
        let artifacts = build_artifacts(&ctx).unwrap();
        assert_eq!(artifacts.len(), 4);
        assert_eq!(artifacts[3].artifact_type, ArtifactType::SummaryMd);
    }

    #[test]
    fn evidence_payload_is_keyed_by_theme() {
        let artifacts = build_artifacts(&context()).unwrap();
        let ArtifactPayload::Json(value) = &artifacts[1].payload else {
            panic!("evidence artifact should be JSON");
        };
        assert_eq!(value["creation"][0]["segment_id"], "p00012");
        assert_eq!(value["creation"][0]["chapter"], "Chapter 5");
    }

    #[test]
    fn missing_essay_is_a_data_integrity_error() {
        let mut ctx = context();
        ctx.essay = None;
        let err = build_artifacts(&ctx).unwrap_err();
        assert!(err.is_data_integrity());
    }
}
