use litessay_core::job_events::{STEP_DRAFT_ESSAY, STEP_REVISE_ESSAY};

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::evidence::{evidence_block, expanded_evidence_block, theme_intros_block};
use crate::prompts;

/// Write the first draft from the theme intros and the evidence, with
/// surrounding context when it is available.
pub(crate) async fn draft(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_DRAFT_ESSAY;
    let themes = ctx.require_themes(STAGE)?;
    let summary = ctx.require_summary(STAGE)?;

    let evidence = match ctx.expanded_evidence.as_ref().filter(|e| !e.is_empty()) {
        Some(expanded) => expanded_evidence_block(themes, expanded),
        None => evidence_block(themes, ctx.require_evidence(STAGE)?),
    };
    let intros = ctx
        .theme_intros
        .as_ref()
        .map(|intros| theme_intros_block(themes, intros))
        .unwrap_or_default();

    engine
        .progress
        .update(ctx.lease, STAGE, "Generating essay draft")
        .await?;

    let request = prompts::essay_draft(
        ctx.title_or_default(),
        ctx.author_or_default(),
        summary,
        &intros,
        &evidence,
    );
    let essay = engine.collaborators.llm.complete(&request).await?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Essay draft complete")
        .await?;
    tracing::info!(
        job_id = ctx.job_id(),
        themes = themes.len(),
        essay_len = essay.len(),
        "Essay drafted",
    );

    ctx.essay = Some(essay);
    Ok(())
}

/// Rewrite the essay against the reviewer's feedback.
pub(crate) async fn revise(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_REVISE_ESSAY;
    let themes = ctx.require_themes(STAGE)?;
    let evidence = ctx.require_evidence(STAGE)?;
    let essay = ctx.require_essay(STAGE)?;
    let feedback = ctx.require_feedback(STAGE)?;
    let attempt = ctx.revision_count + 1;

    engine
        .progress
        .update(ctx.lease, STAGE, format!("Revising essay (attempt {attempt})"))
        .await?;

    let request = prompts::revise(feedback, essay, &evidence_block(themes, evidence));
    let revised = engine.collaborators.llm.complete(&request).await?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Revision complete")
        .await?;
    tracing::info!(job_id = ctx.job_id(), revision = attempt, "Essay revised");

    ctx.essay = Some(revised);
    ctx.revision_count = attempt;
    Ok(())
}
