use litessay_core::job_events::STEP_REVIEW_ESSAY;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::parse::parse_review;
use crate::prompts;

/// Number of feedback characters shown in the progress detail.
const FEEDBACK_PREVIEW_CHARS: usize = 80;

/// Ask the reviewer for a verdict. Returns whether the essay was approved.
pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<bool, PipelineError> {
    const STAGE: &str = STEP_REVIEW_ESSAY;
    let themes = ctx.require_themes(STAGE)?;
    let essay = ctx.require_essay(STAGE)?;

    engine
        .progress
        .update(
            ctx.lease,
            STAGE,
            format!("Reviewing essay (revision {})", ctx.revision_count),
        )
        .await?;

    let raw = engine
        .collaborators
        .llm
        .complete(&prompts::review(themes, essay))
        .await?;
    let verdict = parse_review(&raw);

    let detail = if verdict.approved {
        "Approved".to_string()
    } else {
        let preview: String = verdict.feedback.chars().take(FEEDBACK_PREVIEW_CHARS).collect();
        format!("Needs revision ({preview}...)")
    };
    engine.progress.update(ctx.lease, STAGE, detail).await?;
    tracing::info!(
        job_id = ctx.job_id(),
        approved = verdict.approved,
        revision_count = ctx.revision_count,
        parsed_by = ?verdict.parsed_by,
        "Essay reviewed",
    );

    ctx.essay_approved = verdict.approved;
    ctx.review_feedback = Some(verdict.feedback);
    Ok(verdict.approved)
}
