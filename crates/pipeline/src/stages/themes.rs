use litessay_core::job_events::STEP_DISCOVER_THEMES;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::parse::parse_themes;
use crate::prompts;

pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_DISCOVER_THEMES;
    let summary = ctx.require_summary(STAGE)?;

    engine
        .progress
        .update(ctx.lease, STAGE, "Identifying literary themes")
        .await?;

    let request = prompts::theme_discovery(ctx.title_or_default(), ctx.author_or_default(), summary);
    let raw = engine.collaborators.llm.complete(&request).await?;
    let themes = parse_themes(&raw);
    if themes.is_empty() {
        tracing::warn!(job_id = ctx.job_id(), "No themes discovered");
    }

    engine
        .progress
        .update(ctx.lease, STAGE, format!("Found {} themes", themes.len()))
        .await?;
    tracing::info!(job_id = ctx.job_id(), themes = ?themes, "Themes discovered");

    ctx.themes = Some(themes);
    Ok(())
}
