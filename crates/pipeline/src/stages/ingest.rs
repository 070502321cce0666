use litessay_core::collaborators::{SegmentMetadata, VectorRecord};
use litessay_core::error::CollaboratorError;
use litessay_core::hashing::content_hash;
use litessay_core::job_events::STEP_INGEST;
use litessay_core::segment::{segment_text, Segment};
use litessay_core::text::normalize_source_text;
use litessay_core::types::DbId;
use litessay_db::models::status::IngestStatus;

use crate::context::StageContext;
use crate::engine::PipelineEngine;
use crate::error::PipelineError;

/// Fetch, segment, embed and index the document.
///
/// A document that is already `ready` is only re-fetched and re-segmented;
/// segment ids are positional, so they match what was indexed before.
pub(crate) async fn run(engine: &PipelineEngine, ctx: &mut StageContext) -> Result<(), PipelineError> {
    let lease = ctx.lease;
    let document = engine
        .store
        .load_document(ctx.document_id)
        .await?
        .ok_or(PipelineError::DocumentNotFound {
            document_id: ctx.document_id,
        })?;

    engine
        .progress
        .update(lease, STEP_INGEST, "Starting ingestion")
        .await?;

    if document.is_ingested() {
        engine
            .progress
            .update(lease, STEP_INGEST, "Already ingested, loading segments")
            .await?;
        let normalized = fetch_normalized(engine, &ctx.source_ref).await?;
        if content_hash(&normalized) != document.canonical_hash {
            tracing::warn!(
                document_id = document.id,
                source_ref = %ctx.source_ref,
                "Source text changed since ingestion, segment ids may not match the index",
            );
        }
        let segments = segment_text(&normalized, engine.config.max_segment_chars);
        tracing::info!(
            document_id = document.id,
            segments = segments.len(),
            "Reloaded segments for ingested document",
        );
        ctx.segments = Some(segments);
        return Ok(());
    }

    engine
        .store
        .set_ingest_status(ctx.document_id, IngestStatus::Running)
        .await?;

    engine
        .progress
        .update(lease, STEP_INGEST, "Fetching source text")
        .await?;
    let normalized = fetch_normalized(engine, &ctx.source_ref).await?;
    let segments = segment_text(&normalized, engine.config.max_segment_chars);
    tracing::info!(document_id = document.id, segments = segments.len(), "Segmented text");

    if !segments.is_empty() {
        engine
            .progress
            .update(
                lease,
                STEP_INGEST,
                format!("Embedding {} segments", segments.len()),
            )
            .await?;
        let records = embed_segments(engine, ctx.document_id, &segments).await?;

        engine
            .progress
            .update(
                lease,
                STEP_INGEST,
                format!("Indexing {} vectors", records.len()),
            )
            .await?;
        engine
            .collaborators
            .index
            .upsert(&ctx.namespace, &records)
            .await?;
        tracing::info!(
            document_id = document.id,
            namespace = %ctx.namespace,
            vectors = records.len(),
            "Indexed segments",
        );
    }

    engine
        .store
        .set_ingest_status(ctx.document_id, IngestStatus::Ready)
        .await?;
    engine
        .progress
        .update(lease, STEP_INGEST, "Ingestion complete")
        .await?;

    ctx.segments = Some(segments);
    Ok(())
}

async fn fetch_normalized(engine: &PipelineEngine, source_ref: &str) -> Result<String, PipelineError> {
    let raw = engine.collaborators.text_source.fetch(source_ref).await?;
    Ok(normalize_source_text(&raw))
}

/// Embed every segment and make sure the index can hold the vectors.
async fn embed_segments(
    engine: &PipelineEngine,
    document_id: DbId,
    segments: &[Segment],
) -> Result<Vec<VectorRecord>, PipelineError> {
    let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
    let vectors = engine.collaborators.embedder.embed_batch(&texts).await?;
    if vectors.len() != segments.len() {
        return Err(CollaboratorError::Decode {
            service: "embedding model",
            message: format!(
                "expected {} embeddings, got {}",
                segments.len(),
                vectors.len()
            ),
        }
        .into());
    }

    if let Some(dimension) = vectors.first().map(Vec::len) {
        engine.collaborators.index.ensure(dimension).await?;
    }

    Ok(segments
        .iter()
        .zip(vectors)
        .map(|(segment, values)| VectorRecord {
            id: segment.segment_id.clone(),
            values,
            metadata: SegmentMetadata {
                document_id,
                paragraph_index: segment.paragraph_index,
                text: segment.text.clone(),
                chapter: segment.chapter.clone(),
            },
        })
        .collect())
}
