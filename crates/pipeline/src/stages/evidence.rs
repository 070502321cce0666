use std::collections::HashMap;

use litessay_core::error::CollaboratorError;
use litessay_core::job_events::{STEP_EXPAND_CONTEXT, STEP_RETRIEVE_EVIDENCE};
use litessay_core::segment::Segment;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::evidence::{expand_context, EvidenceItem, EvidenceMap};

/// Query the top-K nearest segments for every theme.
pub(crate) async fn retrieve(
    engine: &PipelineEngine,
    ctx: &mut StageContext,
) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_RETRIEVE_EVIDENCE;
    let themes = ctx.require_themes(STAGE)?;
    let segments = ctx.require_segments(STAGE)?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Embedding theme queries")
        .await?;

    let mut evidence = EvidenceMap::new();
    if !themes.is_empty() {
        let queries = engine.collaborators.embedder.embed_batch(themes).await?;
        if queries.len() != themes.len() {
            return Err(CollaboratorError::Decode {
                service: "embedding model",
                message: format!("expected {} embeddings, got {}", themes.len(), queries.len()),
            }
            .into());
        }

        let by_id: HashMap<&str, &Segment> = segments
            .iter()
            .map(|s| (s.segment_id.as_str(), s))
            .collect();

        for (theme, vector) in themes.iter().zip(&queries) {
            let matches = engine
                .collaborators
                .index
                .query(&ctx.namespace, vector, engine.config.top_k_evidence)
                .await?;
            let items = matches
                .into_iter()
                .map(|m| EvidenceItem::from_match(m, &by_id))
                .collect();
            evidence.insert(theme.clone(), items);
        }
    }

    let total: usize = evidence.values().map(Vec::len).sum();
    engine
        .progress
        .update(ctx.lease, STAGE, format!("Retrieved {total} evidence passages"))
        .await?;
    tracing::info!(
        job_id = ctx.job_id(),
        themes = evidence.len(),
        passages = total,
        "Evidence retrieved",
    );

    ctx.evidence = Some(evidence);
    Ok(())
}

/// Attach neighbouring segments to every evidence passage.
pub(crate) async fn expand(
    engine: &PipelineEngine,
    ctx: &mut StageContext,
) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_EXPAND_CONTEXT;
    let evidence = ctx.require_evidence(STAGE)?;
    let segments = ctx.require_segments(STAGE)?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Expanding evidence context")
        .await?;

    let expanded = expand_context(evidence, segments, engine.config.expand_context_window);

    engine
        .progress
        .update(ctx.lease, STAGE, "Context expansion complete")
        .await?;
    tracing::debug!(
        themes = expanded.len(),
        window = engine.config.expand_context_window,
        "Context expanded",
    );

    ctx.expanded_evidence = Some(expanded);
    Ok(())
}
