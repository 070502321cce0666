//! Repository for the `documents` table.

use litessay_core::types::DbId;
use sqlx::PgPool;

use crate::models::document::{CreateDocument, Document};
use crate::models::status::IngestStatus;

/// Column list for `documents` queries.
const COLUMNS: &str = "\
    id, source_type, source_ref, canonical_hash, title, author, \
    summary, summary_chunk_count, ingest_status_id, vector_namespace, created_at";

/// Provides CRUD operations for documents.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Insert a document unless one with the same canonical hash exists.
    ///
    /// Returns the existing row in that case, so re-ingesting identical text
    /// always resolves to the same document (and namespace).
    pub async fn insert_or_get(
        pool: &PgPool,
        input: &CreateDocument,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents \
                 (source_type, source_ref, canonical_hash, title, author, \
                  vector_namespace, ingest_status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (canonical_hash) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Document>(&query)
            .bind(&input.source_type)
            .bind(&input.source_ref)
            .bind(&input.canonical_hash)
            .bind(&input.title)
            .bind(&input.author)
            .bind(&input.vector_namespace)
            .bind(IngestStatus::Pending.id())
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(doc) => Ok(doc),
            None => Self::find_by_hash(pool, &input.canonical_hash)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Find a document by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a document by its canonical content hash.
    pub async fn find_by_hash(
        pool: &PgPool,
        canonical_hash: &str,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE canonical_hash = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(canonical_hash)
            .fetch_optional(pool)
            .await
    }

    /// Fill in title/author where they are still NULL. Existing values win.
    pub async fn backfill_metadata(
        pool: &PgPool,
        id: DbId,
        title: Option<&str>,
        author: Option<&str>,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents \
             SET title = COALESCE(title, $2), author = COALESCE(author, $3) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .bind(title)
            .bind(author)
            .fetch_optional(pool)
            .await
    }

    /// Set the ingestion status.
    pub async fn set_ingest_status(
        pool: &PgPool,
        id: DbId,
        status: IngestStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE documents SET ingest_status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cache the final book summary and the number of windows folded into it.
    pub async fn cache_summary(
        pool: &PgPool,
        id: DbId,
        summary: &str,
        chunk_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET summary = $2, summary_chunk_count = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(summary)
        .bind(chunk_count)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
