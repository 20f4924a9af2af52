//! Advisory duplicate detection ahead of ingestion.
//!
//! Web content is a duplicate when the same source already has an article
//! with the same canonical URL; email content when the same sender source
//! already has an article with the same title. This check is a fast-path
//! only: the unique indexes on the articles table remain the authoritative
//! guard, so a concurrent ingest that slips past this probe is still caught
//! at commit time.

use sqlx::SqlitePool;

use crate::error::StoreError;

/// Look up an existing article matching the unit's identity. Returns the
/// existing article id, or `None` when the unit is new.
pub async fn find_existing(
    pool: &SqlitePool,
    source_id: i64,
    url: Option<&str>,
    title: &str,
) -> Result<Option<i64>, StoreError> {
    let id = match url {
        Some(url) if !url.is_empty() => {
            sqlx::query_scalar("SELECT id FROM articles WHERE source_id = ? AND url = ?")
                .bind(source_id)
                .bind(url)
                .fetch_optional(pool)
                .await?
        }
        _ => {
            sqlx::query_scalar(
                "SELECT id FROM articles WHERE source_id = ? AND title = ? AND url = ''",
            )
            .bind(source_id)
            .bind(title)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(id)
}
