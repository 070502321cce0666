use litessay_core::job_events::STEP_SUMMARIZE_BOOK;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::prompts;

/// Build (or reuse) the whole-book summary.
///
/// Segments are summarized in windows of `summary_chunk_size`. Each window
/// sees the summary so far as context, and its own summary is appended to
/// it.
pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    const STAGE: &str = STEP_SUMMARIZE_BOOK;
    let lease = ctx.lease;

    let cached = engine
        .store
        .load_document(ctx.document_id)
        .await?
        .and_then(|doc| doc.cached_summary().map(str::to_string));
    if let Some(summary) = cached {
        tracing::info!(document_id = ctx.document_id, "Using cached summary");
        engine
            .progress
            .update(lease, STAGE, "Using cached summary")
            .await?;
        ctx.book_summary = Some(summary);
        return Ok(());
    }

    let segments = ctx.require_segments(STAGE)?;
    let chunk_size = engine.config.summary_chunk_size.max(1);
    let windows: Vec<String> = segments
        .chunks(chunk_size)
        .map(|window| {
            window
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .collect();
    let total = windows.len();

    engine
        .progress
        .update(lease, STAGE, "Starting summarization")
        .await?;

    let mut summary = String::new();
    for (i, passage) in windows.iter().enumerate() {
        engine
            .progress
            .update_with_summary(
                lease,
                STAGE,
                format!("Summarizing chunk {}/{total}", i + 1),
                summary.clone(),
            )
            .await?;

        let request = prompts::summarize_chunk(&summary, passage);
        let window_summary = engine.collaborators.llm.complete(&request).await?;
        let window_summary = window_summary.trim();
        if !window_summary.is_empty() {
            if !summary.is_empty() {
                summary.push_str("\n\n");
            }
            summary.push_str(window_summary);
        }
        tracing::debug!(chunk = i + 1, total, summary_len = summary.len(), "Chunk summarized");
    }

    if summary.is_empty() {
        tracing::warn!(document_id = ctx.document_id, "Book summary is empty, not caching");
    } else {
        engine
            .store
            .cache_summary(ctx.document_id, &summary, total)
            .await?;
    }

    engine
        .progress
        .update_with_summary(lease, STAGE, "Summarization complete", summary.clone())
        .await?;
    tracing::info!(chunks = total, summary_len = summary.len(), "Book summarized");

    ctx.book_summary = Some(summary);
    Ok(())
}
