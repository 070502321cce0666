use indexmap::IndexMap;
use litessay_core::config::MAX_INTRO_SNIPPETS;
use litessay_core::job_events::STEP_WRITE_THEME_INTROS;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::evidence::snippet_block;
use crate::prompts;

/// One contextual introduction per theme, from the summary and the theme's
/// best few evidence snippets.
pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_WRITE_THEME_INTROS;
    let themes = ctx.require_themes(STAGE)?;
    let evidence = ctx.require_evidence(STAGE)?;
    let summary = ctx.require_summary(STAGE)?;
    let total = themes.len();

    engine
        .progress
        .update(ctx.lease, STAGE, "Writing theme introductions")
        .await?;

    let mut intros = IndexMap::with_capacity(total);
    for (i, theme) in themes.iter().enumerate() {
        engine
            .progress
            .update(
                ctx.lease,
                STAGE,
                format!("Writing introduction {}/{total}: {theme}", i + 1),
            )
            .await?;

        let items = evidence.get(theme).map(Vec::as_slice).unwrap_or_default();
        let snippets = snippet_block(items, MAX_INTRO_SNIPPETS);
        let request = prompts::theme_intro(summary, theme, &snippets);
        let intro = engine.collaborators.llm.complete(&request).await?;
        intros.insert(theme.clone(), intro);
    }

    engine
        .progress
        .update(
            ctx.lease,
            STAGE,
            format!("Wrote {} theme introductions", intros.len()),
        )
        .await?;

    ctx.theme_intros = Some(intros);
    Ok(())
}
